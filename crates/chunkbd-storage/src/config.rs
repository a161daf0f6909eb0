//! Device configuration.
//!
//! Loaded once at startup and consumed as an immutable struct; `bucket_size`
//! and `reported_size` are fixed for the device's lifetime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

const GIBIBYTE: u64 = 1024 * 1024 * 1024;

/// Configuration for one virtual block device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Bytes per bucket. Fixed for the device's lifetime.
    pub bucket_size: u64,
    /// Root directory of the on-disk layout; the device's namespace
    /// directory is created underneath.
    pub parent_dir: PathBuf,
    /// Logical device size in bytes as exposed to protocol clients.
    pub reported_size: u64,
    /// Upper bound on simultaneously open buckets; enforced by the export
    /// layer as an eviction policy.
    pub max_open_files: usize,
    /// Seed the namespace identity is derived from. Devices with different
    /// seeds never share bucket files even under the same parent directory.
    pub encryption_seed: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bucket_size: GIBIBYTE,
            parent_dir: PathBuf::from("chunkbd-data"),
            reported_size: 4 * GIBIBYTE,
            max_open_files: 10,
            encryption_seed: String::from("test"),
        }
    }
}

impl DeviceConfig {
    /// Load a config from a TOML or JSON file, selected by extension.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: DeviceConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| StorageError::InvalidConfig {
                reason: e.to_string(),
            })?,
            "json" => serde_json::from_str(&contents).map_err(|e| StorageError::InvalidConfig {
                reason: e.to_string(),
            })?,
            other => {
                return Err(StorageError::InvalidConfig {
                    reason: format!("unsupported config file extension: {}", other),
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the device cannot start with.
    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket_size == 0 {
            return Err(StorageError::InvalidConfig {
                reason: "bucket_size must be positive".to_string(),
            });
        }
        if self.reported_size == 0 {
            return Err(StorageError::InvalidConfig {
                reason: "reported_size must be positive".to_string(),
            });
        }
        if self.max_open_files == 0 {
            return Err(StorageError::InvalidConfig {
                reason: "max_open_files must be at least 1".to_string(),
            });
        }
        if self.encryption_seed.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "encryption_seed must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Number of buckets covering the reported size (ceiling division).
    pub fn bucket_count(&self) -> u64 {
        (self.reported_size + self.bucket_size - 1) / self.bucket_size
    }
}
