// Configuration validation errors
//
// These errors are produced at the settings boundary. The core never
// receives an unvalidated value: the settings collaborator rejects bad
// input with one of these and resets the field to its last valid value.
//
// Error code range: 2001-2004

use log::error;
use std::fmt;

use super::ErrorCode;

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Settings validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Custom threshold outside the accepted [0.1, 10.0] degree range
    ThresholdOutOfRange { value: f64 },

    /// Field text did not parse as a number
    InvalidNumber { field: String, input: String },

    /// Negative value given for a duration field
    NegativeDuration { field: String },

    /// Vibration intensity outside [0, 1000]
    IntensityOutOfRange { value: i64 },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::ThresholdOutOfRange { .. } => 2001,
            ConfigError::InvalidNumber { .. } => 2002,
            ConfigError::NegativeDuration { .. } => 2003,
            ConfigError::IntensityOutOfRange { .. } => 2004,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::ThresholdOutOfRange { value } => {
                format!(
                    "Threshold must be between 0.1 and 10.0 degrees (got {:.1})",
                    value
                )
            }
            ConfigError::InvalidNumber { field, input } => {
                format!("{} must be a valid number (got {:?})", field, input)
            }
            ConfigError::NegativeDuration { field } => {
                format!("{} must be zero or greater", field)
            }
            ConfigError::IntensityOutOfRange { value } => {
                format!("Vibration intensity must be within 0..=1000 (got {})", value)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
