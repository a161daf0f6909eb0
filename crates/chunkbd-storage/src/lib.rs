#![warn(missing_docs)]

//! chunkbd storage subsystem: the chunked bucket storage engine.
//!
//! This crate maps a logically contiguous block-device address space onto
//! many fixed-size local files ("buckets"), serializes concurrent access per
//! bucket, and defines the device's sparse/zero-fill, trim, and recovery
//! semantics. The protocol layer above consumes the [`ExportProvider`]
//! contract; the recovery collaborator below materializes missing backing
//! files from remote storage before empty ones are synthesized.

pub mod bucket;
pub mod config;
pub mod error;
pub mod export;
pub mod factory;
pub mod metrics;
pub mod namespace;

pub use bucket::Bucket;
pub use config::DeviceConfig;
pub use error::{StorageError, StorageResult};
pub use export::{ChunkedExport, ExportProvider};
pub use factory::{BucketFactory, BUCKET_FILE_PREFIX};
pub use metrics::{StorageMetrics, StorageMetricsSnapshot};
pub use namespace::NamespaceId;
