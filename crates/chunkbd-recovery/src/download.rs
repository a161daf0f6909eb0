//! The recovery seam consumed by the storage engine.
//!
//! `DownloadService` is what the bucket factory talks to when a backing file
//! is missing: one materialization call plus auxiliary status queries that
//! other layers (UI, health endpoints) consume. Ships a no-op implementation
//! for devices with no remote history and an in-memory implementation used as
//! a test double.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of a single recovery attempt for one backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// The remote side holds no copy of this file; the caller should
    /// synthesize an empty one.
    NoRemoteCopy,
    /// The file was fully materialized on local disk.
    Recovered,
    /// A copy may exist remotely but could not be fetched. The caller treats
    /// this the same as `NoRemoteCopy`; the distinction exists for logging.
    Failed,
}

/// Remote recovery operations consumed by the bucket factory.
///
/// `download_if_possible` must be attempted before an empty backing file is
/// synthesized, so a device restarted on a fresh disk transparently recovers
/// previously persisted bucket contents instead of silently reverting to
/// zeros.
pub trait DownloadService: Send + Sync {
    /// Try to materialize `target` from remote storage.
    ///
    /// On `Recovered` the file exists on disk with the recovered bytes; on
    /// any other status the file was not created by this call.
    fn download_if_possible(&self, target: &Path) -> RecoveryStatus;

    /// Whether the remote side holds any metadata for this device at all.
    fn has_metadata(&self) -> bool;

    /// Whether the remote metadata service is currently reachable.
    fn connected(&self) -> bool;

    /// Percentage (0.0–100.0) of remotely known files already present under
    /// `parent_dir`.
    fn completed_percent(&self, parent_dir: &Path) -> f64;
}

/// Recovery implementation for devices with no remote history.
///
/// Every lookup answers "no remote copy", so the factory always synthesizes
/// empty buckets.
#[derive(Debug, Default)]
pub struct NoRecovery;

impl DownloadService for NoRecovery {
    fn download_if_possible(&self, target: &Path) -> RecoveryStatus {
        debug!(path = %target.display(), "recovery disabled, nothing to download");
        RecoveryStatus::NoRemoteCopy
    }

    fn has_metadata(&self) -> bool {
        false
    }

    fn connected(&self) -> bool {
        false
    }

    fn completed_percent(&self, _parent_dir: &Path) -> f64 {
        100.0
    }
}

/// Statistics about operations against a [`MemoryRecovery`] instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRecoveryStats {
    /// Number of recovery attempts.
    pub attempts: u64,
    /// Number of attempts that materialized a file.
    pub hits: u64,
    /// Number of attempts that failed while writing to disk.
    pub failures: u64,
}

/// In-memory recovery source for testing.
///
/// Maps backing filenames to their remote content, materializing them on
/// request exactly like the real service would.
#[derive(Default)]
pub struct MemoryRecovery {
    files: Mutex<HashMap<String, Vec<u8>>>,
    stats: Mutex<MemoryRecoveryStats>,
}

impl MemoryRecovery {
    /// Create an empty in-memory recovery source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register remote content for the given backing filename.
    pub fn insert(&self, filename: impl Into<String>, content: Vec<u8>) {
        self.files.lock().unwrap().insert(filename.into(), content);
    }

    /// Snapshot of operation statistics.
    pub fn stats(&self) -> MemoryRecoveryStats {
        self.stats.lock().unwrap().clone()
    }
}

impl DownloadService for MemoryRecovery {
    fn download_if_possible(&self, target: &Path) -> RecoveryStatus {
        self.stats.lock().unwrap().attempts += 1;

        let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %target.display(), "recovery target has no usable filename");
            self.stats.lock().unwrap().failures += 1;
            return RecoveryStatus::Failed;
        };

        let content = self.files.lock().unwrap().get(name).cloned();
        match content {
            Some(bytes) => match std::fs::write(target, &bytes) {
                Ok(()) => {
                    debug!(file = name, bytes = bytes.len(), "materialized file from memory store");
                    self.stats.lock().unwrap().hits += 1;
                    RecoveryStatus::Recovered
                }
                Err(e) => {
                    warn!(file = name, error = %e, "failed to write recovered file");
                    self.stats.lock().unwrap().failures += 1;
                    RecoveryStatus::Failed
                }
            },
            None => RecoveryStatus::NoRemoteCopy,
        }
    }

    fn has_metadata(&self) -> bool {
        !self.files.lock().unwrap().is_empty()
    }

    fn connected(&self) -> bool {
        true
    }

    fn completed_percent(&self, parent_dir: &Path) -> f64 {
        let files = self.files.lock().unwrap();
        if files.is_empty() {
            return 100.0;
        }
        let present = files
            .keys()
            .filter(|name| parent_dir.join(name.as_str()).exists())
            .count();
        present as f64 * 100.0 / files.len() as f64
    }
}
