//! Shared fixtures for the integration suites.

use std::path::Path;
use std::sync::Arc;

use chunkbd_recovery::{DownloadService, NoRecovery};
use chunkbd_storage::{ChunkedExport, DeviceConfig, NamespaceId};
use tempfile::TempDir;

/// A virtual device over a temporary directory, torn down on drop.
pub struct TestDevice {
    dir: TempDir,
    config: DeviceConfig,
    /// The export under test.
    pub export: ChunkedExport,
}

impl TestDevice {
    /// Device with the given geometry and recovery collaborator.
    pub fn new(
        bucket_size: u64,
        reported_size: u64,
        max_open_files: usize,
        recovery: Arc<dyn DownloadService>,
    ) -> Self {
        init_test_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DeviceConfig {
            bucket_size,
            parent_dir: dir.path().to_path_buf(),
            reported_size,
            max_open_files,
            encryption_seed: "integration test seed".to_string(),
        };
        let export = ChunkedExport::new(config.clone(), recovery).expect("export");
        Self {
            dir,
            config,
            export,
        }
    }

    /// Device with no remote history: every bucket starts empty.
    pub fn with_no_recovery(bucket_size: u64, reported_size: u64, max_open_files: usize) -> Self {
        Self::new(bucket_size, reported_size, max_open_files, Arc::new(NoRecovery))
    }

    /// The configuration the device was built with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Root directory holding the namespace directory.
    pub fn parent_dir(&self) -> &Path {
        self.dir.path()
    }

    /// The directory holding this device's backing files.
    pub fn namespace_dir(&self) -> std::path::PathBuf {
        self.dir
            .path()
            .join(NamespaceId::derive(&self.config.encryption_seed).as_str())
    }

    /// Reopen the same on-disk state as a fresh export, as a device restart
    /// would.
    pub fn reopen(&self, recovery: Arc<dyn DownloadService>) -> ChunkedExport {
        ChunkedExport::new(self.config.clone(), recovery).expect("reopen export")
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
