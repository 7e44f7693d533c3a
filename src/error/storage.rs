// Persistence errors
//
// These errors cover preference-store I/O and event-log serialization.
// A failed read is reported to the user and treated as an empty record
// set; it never aborts session operation.
//
// Error code range: 3001-3003

use log::error;
use std::fmt;

use super::ErrorCode;

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Persistence errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Stored data could not be read
    ReadFailed { reason: String },

    /// Data could not be written to the store
    WriteFailed { reason: String },

    /// Stored data was present but not deserializable
    Corrupted { reason: String },
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::ReadFailed { .. } => 3001,
            StorageError::WriteFailed { .. } => 3002,
            StorageError::Corrupted { .. } => 3003,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::ReadFailed { reason } => format!("Failed to read records: {}", reason),
            StorageError::WriteFailed { reason } => format!("Failed to write records: {}", reason),
            StorageError::Corrupted { reason } => format!("Stored records corrupted: {}", reason),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Corrupted {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::ReadFailed {
            reason: err.to_string(),
        }
    }
}
