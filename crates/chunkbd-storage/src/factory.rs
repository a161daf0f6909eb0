//! Bucket construction: path derivation and the recover-or-create decision.

use std::path::PathBuf;
use std::sync::Arc;

use chunkbd_recovery::{DownloadService, RecoveryStatus};
use tracing::{debug, info, warn};

use crate::bucket::Bucket;
use crate::config::DeviceConfig;
use crate::error::StorageResult;
use crate::metrics::StorageMetrics;
use crate::namespace::NamespaceId;

/// Fixed format tag of bucket backing files: `chunkbd_v1_<index>.dat`.
pub const BUCKET_FILE_PREFIX: &str = "chunkbd_v1_";

/// Constructs buckets on demand under the device's namespace directory.
///
/// `create` is deterministic at the file level (one index, one path) but not
/// memoizing at the object level: repeated calls yield distinct `Bucket`
/// objects over the same file. The export layer caches by index so exactly
/// one live bucket exists per index.
pub struct BucketFactory {
    bucket_size: u64,
    namespace_dir: PathBuf,
    recovery: Arc<dyn DownloadService>,
    metrics: Arc<StorageMetrics>,
}

impl BucketFactory {
    /// Build a factory, creating the namespace directory if needed.
    ///
    /// Directory creation failure is fatal: without it the device's address
    /// space cannot be represented.
    pub fn new(
        config: &DeviceConfig,
        namespace: &NamespaceId,
        recovery: Arc<dyn DownloadService>,
        metrics: Arc<StorageMetrics>,
    ) -> StorageResult<Self> {
        let namespace_dir = config.parent_dir.join(namespace.as_str());
        std::fs::create_dir_all(&namespace_dir)?;
        info!(dir = %namespace_dir.display(), "bucket namespace directory ready");
        Ok(Self {
            bucket_size: config.bucket_size,
            namespace_dir,
            recovery,
            metrics,
        })
    }

    /// Deterministic backing-file path for the given index.
    pub fn bucket_path(&self, index: u64) -> PathBuf {
        self.namespace_dir
            .join(format!("{}{}.dat", BUCKET_FILE_PREFIX, index))
    }

    /// The directory holding this device's backing files.
    pub fn namespace_dir(&self) -> &std::path::Path {
        &self.namespace_dir
    }

    /// Create the bucket for `index`, materializing its backing file first.
    ///
    /// A missing file is offered to the recovery collaborator before an
    /// empty one is synthesized; failure to synthesize is fatal at
    /// construction.
    pub fn create(&self, index: u64) -> StorageResult<Bucket> {
        let path = self.bucket_path(index);
        if !path.exists() {
            match self.recovery.download_if_possible(&path) {
                RecoveryStatus::Recovered => {
                    info!(bucket = index, "backing file recovered from remote storage");
                    self.metrics.record_bucket_recovered();
                }
                status @ (RecoveryStatus::NoRemoteCopy | RecoveryStatus::Failed) => {
                    if status == RecoveryStatus::Failed {
                        warn!(
                            bucket = index,
                            "remote recovery failed, starting from an empty bucket"
                        );
                    }
                    std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&path)?;
                    debug!(bucket = index, "synthesized empty backing file");
                    self.metrics.record_bucket_synthesized();
                }
            }
        }

        let bucket = Bucket::open(index, self.bucket_size, path, self.metrics.clone())?;
        self.metrics.record_bucket_opened();
        Ok(bucket)
    }
}
