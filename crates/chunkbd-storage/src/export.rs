//! The device contract surfaced to the protocol layer, and its
//! bucket-spanning implementation.
//!
//! `ChunkedExport` decomposes every request into per-bucket calls: the engine
//! serves at most one bucket's worth per call and reports how many bytes it
//! actually handled, so this layer advances the offset and repeats until the
//! full span is satisfied. Writes are split *before* the engine call — the
//! engine rejects rather than clamps a boundary-crossing write.
//!
//! Live buckets are memoized per index in a concurrent arena, so two racing
//! first accesses to the same index construct exactly one bucket (the
//! factory itself deliberately does not deduplicate).

use std::collections::VecDeque;
use std::sync::Arc;

use chunkbd_recovery::DownloadService;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bucket::Bucket;
use crate::config::DeviceConfig;
use crate::error::{StorageError, StorageResult};
use crate::factory::BucketFactory;
use crate::metrics::StorageMetrics;
use crate::namespace::NamespaceId;

/// The device-facing API consumed by the network block-device layer.
///
/// Implementations accept any protocol option flags by default; the engine
/// places no constraints on them.
pub trait ExportProvider: Send + Sync {
    /// Open the export and return the reported device size in bytes.
    fn open(&self, export_name: &str) -> StorageResult<u64>;

    /// Read `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: usize) -> StorageResult<Vec<u8>>;

    /// Write `buf` at `offset`. With `sync`, touched buckets are flushed
    /// before returning.
    fn write(&self, offset: u64, buf: &[u8], sync: bool) -> StorageResult<()>;

    /// Logically discard `length` bytes starting at `offset`.
    fn trim(&self, offset: u64, length: u64) -> StorageResult<()>;

    /// Flush all live buckets.
    fn flush(&self) -> StorageResult<()>;

    /// Close all live buckets, forcing durability. Called at device shutdown.
    fn close(&self) -> StorageResult<()>;

    /// Whether the given protocol client flags are acceptable.
    fn supports_client_flags(&self, _client_flags: u32) -> bool {
        true
    }
}

/// Chunked bucket implementation of [`ExportProvider`].
pub struct ChunkedExport {
    config: DeviceConfig,
    factory: BucketFactory,
    buckets: DashMap<u64, Arc<Bucket>>,
    /// Access order for eviction, most recent at the front.
    lru: Mutex<VecDeque<u64>>,
    metrics: Arc<StorageMetrics>,
}

impl ChunkedExport {
    /// Build the export over a validated config and a recovery collaborator.
    pub fn new(config: DeviceConfig, recovery: Arc<dyn DownloadService>) -> StorageResult<Self> {
        config.validate()?;
        let metrics = Arc::new(StorageMetrics::new());
        let namespace = NamespaceId::derive(&config.encryption_seed);
        let factory = BucketFactory::new(&config, &namespace, recovery, metrics.clone())?;
        info!(
            namespace = %namespace,
            buckets = config.bucket_count(),
            bucket_size = config.bucket_size,
            reported_size = config.reported_size,
            "chunked export ready"
        );
        Ok(Self {
            config,
            factory,
            buckets: DashMap::new(),
            lru: Mutex::new(VecDeque::new()),
            metrics,
        })
    }

    /// Engine metrics.
    pub fn metrics(&self) -> Arc<StorageMetrics> {
        self.metrics.clone()
    }

    /// The device configuration this export serves.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Number of currently open buckets.
    pub fn live_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// The live bucket for `index`, constructing it on first access.
    ///
    /// Construction happens under the arena's per-key entry lock, so two
    /// racing callers get the same bucket object.
    fn bucket(&self, index: u64) -> StorageResult<Arc<Bucket>> {
        let bucket = match self.buckets.entry(index) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let bucket = Arc::new(self.factory.create(index)?);
                entry.insert(bucket.clone());
                bucket
            }
        };
        self.touch(index);
        self.evict_overflow();
        Ok(bucket)
    }

    fn touch(&self, index: u64) {
        let mut lru = self.lru.lock();
        if let Some(pos) = lru.iter().position(|&i| i == index) {
            lru.remove(pos);
        }
        lru.push_front(index);
    }

    /// Close least-recently-used idle buckets until the arena fits
    /// `max_open_files`. A bucket still referenced by an in-flight operation
    /// is never evicted.
    fn evict_overflow(&self) {
        while self.buckets.len() > self.config.max_open_files {
            let candidate = {
                let lru = self.lru.lock();
                lru.iter()
                    .rev()
                    .find(|&&idx| {
                        self.buckets
                            .get(&idx)
                            .map(|b| Arc::strong_count(b.value()) == 1)
                            .unwrap_or(false)
                    })
                    .copied()
            };
            let Some(idx) = candidate else {
                return;
            };
            let Some((_, bucket)) = self
                .buckets
                .remove_if(&idx, |_, b| Arc::strong_count(b) == 1)
            else {
                // raced with a concurrent access; give up for this round
                return;
            };
            self.lru.lock().retain(|&i| i != idx);
            if let Err(e) = bucket.close() {
                warn!(bucket = idx, error = %e, "failed to close evicted bucket");
            }
            self.metrics.record_bucket_evicted();
            debug!(bucket = idx, "evicted idle bucket");
        }
    }

    /// Reject zero-length, overflowing, and beyond-device spans.
    fn check_span(&self, offset: u64, length: u64) -> StorageResult<()> {
        if length == 0 {
            return Err(StorageError::InvalidArgument {
                reason: format!("zero-length request at offset {}", offset),
            });
        }
        let end = offset
            .checked_add(length)
            .ok_or_else(|| StorageError::InvalidArgument {
                reason: format!("request span at offset {} overflows", offset),
            })?;
        if end > self.config.reported_size {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "request [{}, {}) exceeds device size {}",
                    offset, end, self.config.reported_size
                ),
            });
        }
        Ok(())
    }
}

impl ExportProvider for ChunkedExport {
    fn open(&self, export_name: &str) -> StorageResult<u64> {
        info!(
            export = export_name,
            reported_size = self.config.reported_size,
            "export opened"
        );
        Ok(self.config.reported_size)
    }

    fn read(&self, offset: u64, length: usize) -> StorageResult<Vec<u8>> {
        self.check_span(offset, length as u64)?;
        let mut data = vec![0u8; length];
        let mut filled = 0usize;
        while filled < length {
            let pos = offset + filled as u64;
            let bucket = self.bucket(pos / self.config.bucket_size)?;
            let served = bucket.read_at(pos, &mut data[filled..])?;
            filled += served;
        }
        self.metrics.record_read(length as u64);
        Ok(data)
    }

    fn write(&self, offset: u64, buf: &[u8], sync: bool) -> StorageResult<()> {
        self.check_span(offset, buf.len() as u64)?;
        let mut written = 0usize;
        while written < buf.len() {
            let pos = offset + written as u64;
            let bucket = self.bucket(pos / self.config.bucket_size)?;
            // split at the bucket boundary; the engine never clamps writes
            let capacity = (bucket.upper_bound() - pos + 1) as usize;
            let chunk = capacity.min(buf.len() - written);
            bucket.write_at(pos, &buf[written..written + chunk])?;
            if sync {
                bucket.flush();
            }
            written += chunk;
        }
        self.metrics.record_write(buf.len() as u64);
        Ok(())
    }

    fn trim(&self, offset: u64, length: u64) -> StorageResult<()> {
        self.check_span(offset, length)?;
        let mut discarded = 0u64;
        while discarded < length {
            let pos = offset + discarded;
            let bucket = self.bucket(pos / self.config.bucket_size)?;
            discarded += bucket.trim(pos, length - discarded)?;
        }
        self.metrics.record_trim();
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        for entry in self.buckets.iter() {
            entry.value().flush();
        }
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        info!(live = self.buckets.len(), "closing export, shutting down all buckets");
        let indices: Vec<u64> = self.buckets.iter().map(|e| *e.key()).collect();
        let mut first_err = None;
        for idx in indices {
            if let Some((_, bucket)) = self.buckets.remove(&idx) {
                if let Err(e) = bucket.close() {
                    warn!(bucket = idx, error = %e, "failed to close bucket during shutdown");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        self.lru.lock().clear();
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
