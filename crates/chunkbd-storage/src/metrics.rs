//! Operation counters for the storage engine.
//!
//! Counters only — wiring them into an exporter is a concern of the layer
//! that hosts the device, not of the engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters tracking engine activity.
#[derive(Debug, Default)]
pub struct StorageMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
    trims: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    bytes_zero_filled: AtomicU64,
    buckets_opened: AtomicU64,
    buckets_recovered: AtomicU64,
    buckets_synthesized: AtomicU64,
    buckets_evicted: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetricsSnapshot {
    /// Read operations served.
    pub reads: u64,
    /// Write operations served.
    pub writes: u64,
    /// Trim operations served.
    pub trims: u64,
    /// Flush operations attempted.
    pub flushes: u64,
    /// Flushes that failed (logged and swallowed).
    pub flush_failures: u64,
    /// Bytes returned to readers, including zero-filled bytes.
    pub bytes_read: u64,
    /// Bytes accepted from writers.
    pub bytes_written: u64,
    /// Bytes served as logical zeros beyond the physical file length.
    pub bytes_zero_filled: u64,
    /// Buckets opened (first access or after eviction).
    pub buckets_opened: u64,
    /// Backing files materialized from remote storage.
    pub buckets_recovered: u64,
    /// Empty backing files synthesized locally.
    pub buckets_synthesized: u64,
    /// Idle buckets closed by the open-files eviction policy.
    pub buckets_evicted: u64,
}

impl StorageMetrics {
    /// Create a zeroed metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed read of `bytes` bytes.
    pub fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a completed write of `bytes` bytes.
    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a completed trim.
    pub fn record_trim(&self) {
        self.trims.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush attempt.
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush that failed.
    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `bytes` bytes served as logical zeros.
    pub fn record_zero_fill(&self, bytes: u64) {
        self.bytes_zero_filled.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a bucket handle being opened.
    pub fn record_bucket_opened(&self) {
        self.buckets_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backing file recovered from remote storage.
    pub fn record_bucket_recovered(&self) {
        self.buckets_recovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an empty backing file synthesized locally.
    pub fn record_bucket_synthesized(&self) {
        self.buckets_synthesized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bucket closed by the eviction policy.
    pub fn record_bucket_evicted(&self) {
        self.buckets_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            trims: self.trims.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_zero_filled: self.bytes_zero_filled.load(Ordering::Relaxed),
            buckets_opened: self.buckets_opened.load(Ordering::Relaxed),
            buckets_recovered: self.buckets_recovered.load(Ordering::Relaxed),
            buckets_synthesized: self.buckets_synthesized.load(Ordering::Relaxed),
            buckets_evicted: self.buckets_evicted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = StorageMetrics::new();
        metrics.record_read(100);
        metrics.record_read(50);
        metrics.record_write(200);
        metrics.record_trim();
        metrics.record_flush();
        metrics.record_flush_failure();
        metrics.record_zero_fill(30);
        metrics.record_bucket_opened();
        metrics.record_bucket_recovered();
        metrics.record_bucket_synthesized();
        metrics.record_bucket_evicted();

        let snap = metrics.snapshot();
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.bytes_read, 150);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.bytes_written, 200);
        assert_eq!(snap.trims, 1);
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.flush_failures, 1);
        assert_eq!(snap.bytes_zero_filled, 30);
        assert_eq!(snap.buckets_opened, 1);
        assert_eq!(snap.buckets_recovered, 1);
        assert_eq!(snap.buckets_synthesized, 1);
        assert_eq!(snap.buckets_evicted, 1);
    }

    #[test]
    fn test_snapshot_is_serializable() {
        let metrics = StorageMetrics::new();
        metrics.record_write(8);

        let snap = metrics.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let decoded: StorageMetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, decoded);
    }
}
