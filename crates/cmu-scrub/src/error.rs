//! Error types for the scrubbing pipeline.
//!
//! These are failures of the pipeline itself. They are never fed back into
//! the scrubber: a harness that sees one passes it through untouched.

use thiserror::Error;

/// Result type for scrubbing operations.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Errors raised by the scrubbing pipeline.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// An allow-list pattern failed to compile.
    #[error("invalid allow-list pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Writing the trace to the output sink failed.
    #[error("failed to write stack trace to sink: {0}")]
    Sink(#[source] std::io::Error),

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while loading or saving a policy file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrubError {
    /// Returns true for configuration problems (bad patterns, bad values).
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScrubError::Pattern { .. } | ScrubError::Config(_))
    }
}
