//! Error types for the collector
//!
//! The sensing core itself never fails; these cover configuration,
//! file storage and session control.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable was present but could not be parsed
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// Timer period must be non-zero
    #[error("Timer period must be greater than zero")]
    ZeroPeriod,
}

/// Errors raised by the data and message files
#[derive(Error, Debug)]
pub enum StorageError {
    /// The file could not be opened for appending
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The line could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Message labels are restricted to `[_-a-z0-9]+`
    #[error("Invalid message '{0}': only lowercase letters, digits, '_' and '-' are allowed")]
    InvalidMessage(String),
}

/// Errors raised when controlling a collection session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Collection cannot start without a label
    #[error("No message set for collection")]
    EmptyMessage,

    /// The configured sensor device is unusable
    #[error("Sensor device {path} is unavailable: {reason}")]
    SensorUnavailable { path: PathBuf, reason: String },
}
