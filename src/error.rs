//! Error types for quotagate.

use thiserror::Error;

/// Main error type for gate and limiter operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Structurally invalid limiter or gate construction input
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The wait context was cancelled before admission
    #[error("Wait cancelled")]
    Cancelled,

    /// The wait context's deadline elapsed before admission
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The gate has no operation with this name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Configuration file parse errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Whether this error came from an aborted wait rather than bad input.
    pub fn is_wait_failure(&self) -> bool {
        matches!(self, GateError::Cancelled | GateError::DeadlineExceeded)
    }
}

/// Result type alias for quotagate operations.
pub type Result<T> = std::result::Result<T, GateError>;
