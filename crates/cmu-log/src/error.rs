//! Error types for logging and metrics.

use thiserror::Error;

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors that can occur while logging or recording metrics.
#[derive(Error, Debug)]
pub enum LogError {
    /// Failed to write a metrics record.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode a metrics record.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A global subscriber was already installed.
    #[error("logging init failed: {0}")]
    Init(String),
}
