// Sensor and haptics errors
//
// These errors cover accelerometer subscription and vibration output.
// Both capabilities are best-effort: callers degrade a feature rather
// than abort the session when one of these is returned.
//
// Error code range: 1001-1005

use log::error;
use std::fmt;

use super::ErrorCode;

/// Log a sensor error with structured context
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// Device has no accelerometer
    NotSupported,

    /// Sensor permission was denied by the user or platform
    PermissionDenied,

    /// Accelerometer subscription is already active
    AlreadyMonitoring,

    /// Accelerometer subscription is not active
    NotMonitoring,

    /// Vibration hardware is absent or the permission was revoked
    VibrationUnavailable,
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::NotSupported => 1001,
            SensorError::PermissionDenied => 1002,
            SensorError::AlreadyMonitoring => 1003,
            SensorError::NotMonitoring => 1004,
            SensorError::VibrationUnavailable => 1005,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::NotSupported => "Accelerometer not supported on this device".to_string(),
            SensorError::PermissionDenied => "Sensor permission denied".to_string(),
            SensorError::AlreadyMonitoring => {
                "Accelerometer already monitoring. Call stop_sensor() first.".to_string()
            }
            SensorError::NotMonitoring => {
                "Accelerometer not monitoring. Call start_sensor() first.".to_string()
            }
            SensorError::VibrationUnavailable => "Vibration unavailable".to_string(),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}
