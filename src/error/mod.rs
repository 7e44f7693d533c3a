// Error types for the tilt monitor
//
// This module defines custom error types for sensor, configuration, and
// storage operations, providing structured error handling with numeric
// codes suitable for surfacing across the UI boundary.

mod config;
mod sensor;
mod storage;

pub use config::{log_config_error, ConfigError};
pub use sensor::{log_sensor_error, SensorError};
pub use storage::{log_storage_error, StorageError};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling at the
/// boundary between the core and its UI collaborators.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
