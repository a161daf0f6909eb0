//! Error types for the recovery subsystem.

use thiserror::Error;

/// Result type alias for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Error variants for recovery operations.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Wraps standard I/O errors (staging files, renames).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps HTTP client errors (connect, timeout, body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote storage service answered but could not serve the request.
    #[error("remote storage unavailable: {reason}")]
    Unavailable {
        /// Description of why the service is considered unavailable.
        reason: String,
    },
}
