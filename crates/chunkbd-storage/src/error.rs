//! Error types for the bucket storage engine.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error variants for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Wraps standard I/O errors against the backing store. Never swallowed:
    /// hiding a failed read or write would silently corrupt the device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller violated the engine's contract (offset before a bucket's
    /// base, non-positive length, a write spanning a bucket boundary). This
    /// indicates a bug in the layer above, not a data condition.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the violated precondition.
        reason: String,
    },

    /// An operation was issued against a bucket whose handle has been
    /// released. Buckets never reopen; this is a programming error.
    #[error("bucket {index} is closed")]
    BucketClosed {
        /// Index of the closed bucket.
        index: u64,
    },

    /// The device configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}
