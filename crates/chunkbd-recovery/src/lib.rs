#![warn(missing_docs)]

//! chunkbd recovery subsystem: remote bucket recovery for the virtual block device.
//!
//! When the storage engine finds a bucket's backing file missing on local
//! disk, it consults this crate before synthesizing an empty file. The
//! `DownloadService` trait is the seam: the engine only ever asks "can you
//! materialize this file?" and a handful of auxiliary status questions. The
//! concrete implementations range from a no-op (fresh devices, tests) to an
//! HTTP client of the remote metadata service with auth-token exchange and
//! bounded, cancellable retry.

pub mod download;
pub mod error;
pub mod remote;
pub mod retry;
pub mod token;

pub use download::{DownloadService, MemoryRecovery, MemoryRecoveryStats, NoRecovery, RecoveryStatus};
pub use error::{RecoveryError, RecoveryResult};
pub use remote::{RemoteRecovery, RemoteRecoveryConfig};
pub use retry::{CancellationToken, RetryConfig, RetryExecutor, RetryOutcome};
pub use token::TokenService;
