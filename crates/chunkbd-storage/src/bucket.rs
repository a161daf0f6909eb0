//! The fixed-size, file-backed storage unit.
//!
//! A bucket owns exactly one backing-file handle, guarded by one mutex; every
//! seek-then-transfer sequence runs as a single critical section so two
//! operations can never race on the shared file cursor. No lock is shared
//! across buckets — operations on distinct indices proceed in parallel.
//!
//! Reads clamp to the bucket's remaining capacity and zero-fill past the
//! file's physical length; writes are **not** clamped — a buffer whose span
//! would cross the bucket's upper bound is rejected, and the export layer is
//! responsible for splitting writes at bucket boundaries. This asymmetry is
//! part of the engine's contract.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::metrics::StorageMetrics;

/// Chunk size for zeroing partial trims without allocating the whole range.
const ZERO_CHUNK: usize = 1024 * 1024;

/// One fixed-size storage unit of the virtual device.
pub struct Bucket {
    index: u64,
    bucket_size: u64,
    base_offset: u64,
    /// Highest valid device offset in this bucket, given a minimum length of 1.
    upper_bound: u64,
    path: PathBuf,
    metrics: Arc<StorageMetrics>,
    handle: Mutex<Option<File>>,
}

impl Bucket {
    /// Open the bucket over an existing backing file.
    ///
    /// The factory guarantees the file exists before this is called.
    pub(crate) fn open(
        index: u64,
        bucket_size: u64,
        path: PathBuf,
        metrics: Arc<StorageMetrics>,
    ) -> StorageResult<Self> {
        debug!(bucket = index, path = %path.display(), "opening bucket");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)?;
        let base_offset = index * bucket_size;
        Ok(Self {
            index,
            bucket_size,
            base_offset,
            upper_bound: base_offset + bucket_size - 1,
            path,
            metrics,
            handle: Mutex::new(Some(file)),
        })
    }

    /// Read into `dst` starting at the device-global `offset`.
    ///
    /// Serves at most the bucket's remaining capacity and returns the number
    /// of bytes placed in `dst`; the caller issues a follow-up call against
    /// the next bucket for any remainder. Bytes beyond the backing file's
    /// physical length read as zeros — "never written" is logical zero, not
    /// a short read.
    pub fn read_at(&self, offset: u64, dst: &mut [u8]) -> StorageResult<usize> {
        let local = self.local_offset(offset)?;
        let actual = self.clamped_length(local, dst.len() as u64)? as usize;

        let filled = {
            let mut guard = self.handle.lock();
            let file = guard
                .as_mut()
                .ok_or(StorageError::BucketClosed { index: self.index })?;
            file.seek(SeekFrom::Start(local))?;
            let mut filled = 0usize;
            while filled < actual {
                let n = file.read(&mut dst[filled..actual])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            filled
        };

        if filled < actual {
            dst[filled..actual].fill(0);
            self.metrics.record_zero_fill((actual - filled) as u64);
            debug!(
                bucket = self.index,
                zeroes = actual - filled,
                "read past written length, serving zeros"
            );
        }
        Ok(actual)
    }

    /// Write `buf` at the device-global `offset`.
    ///
    /// Not clamped: the whole buffer must fit between `offset` and this
    /// bucket's upper bound, otherwise the call is rejected as a caller bug.
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> StorageResult<usize> {
        let local = self.local_offset(offset)?;
        if buf.is_empty() {
            return Err(StorageError::InvalidArgument {
                reason: format!("empty write at offset {}", offset),
            });
        }
        let last = offset
            .checked_add(buf.len() as u64 - 1)
            .ok_or_else(|| StorageError::InvalidArgument {
                reason: format!("write span at offset {} overflows", offset),
            })?;
        if last > self.upper_bound {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "write of {} bytes at offset {} crosses bucket end {}",
                    buf.len(),
                    offset,
                    self.upper_bound
                ),
            });
        }

        let mut guard = self.handle.lock();
        let file = guard
            .as_mut()
            .ok_or(StorageError::BucketClosed { index: self.index })?;
        file.seek(SeekFrom::Start(local))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    /// Logically discard a range, clamped to the bucket like a read.
    ///
    /// A trim covering the whole bucket truncates the backing file to zero
    /// length and forces it durable — the compact representation of "this
    /// bucket is entirely empty". Anything smaller writes explicit zeros
    /// over the clamped range. Returns the clamped length.
    pub fn trim(&self, offset: u64, length: u64) -> StorageResult<u64> {
        let local = self.local_offset(offset)?;
        let actual = self.clamped_length(local, length)?;

        let mut guard = self.handle.lock();
        let file = guard
            .as_mut()
            .ok_or(StorageError::BucketClosed { index: self.index })?;
        if actual == self.bucket_size {
            file.set_len(0)?;
            file.sync_all()?;
            debug!(bucket = self.index, "whole-bucket trim, truncated backing file");
        } else {
            file.seek(SeekFrom::Start(local))?;
            let zeros = vec![0u8; ZERO_CHUNK.min(actual as usize)];
            let mut remaining = actual as usize;
            while remaining > 0 {
                let n = remaining.min(zeros.len());
                file.write_all(&zeros[..n])?;
                remaining -= n;
            }
        }
        Ok(actual)
    }

    /// Force buffered writes to durable storage.
    ///
    /// Failure is logged and swallowed: durability on flush is best-effort
    /// and never takes the device down.
    pub fn flush(&self) {
        self.metrics.record_flush();
        let guard = self.handle.lock();
        if let Some(file) = guard.as_ref() {
            if let Err(e) = file.sync_all() {
                self.metrics.record_flush_failure();
                warn!(bucket = self.index, file = %self.path.display(), error = %e, "unable to flush bucket file");
            }
        }
    }

    /// Durable sync followed by release of the backing-file handle.
    ///
    /// Closing is one-way; later operations fail with `BucketClosed`.
    pub fn close(&self) -> StorageResult<()> {
        let mut guard = self.handle.lock();
        match guard.take() {
            Some(file) => {
                file.sync_all()?;
                debug!(bucket = self.index, "closed bucket");
                Ok(())
            }
            None => {
                warn!(bucket = self.index, "closing bucket without an open handle");
                Ok(())
            }
        }
    }

    /// The shared clamp rule for reads and trims: never serve past the
    /// bucket's end, reject non-positive lengths and out-of-bucket offsets.
    pub fn clamped_length(&self, local_offset: u64, length: u64) -> StorageResult<u64> {
        if length < 1 {
            return Err(StorageError::InvalidArgument {
                reason: format!("length must be positive, got {}", length),
            });
        }
        if local_offset >= self.bucket_size {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "local offset {} is at or past bucket size {}",
                    local_offset, self.bucket_size
                ),
            });
        }
        Ok((self.bucket_size - local_offset).min(length))
    }

    fn local_offset(&self, offset: u64) -> StorageResult<u64> {
        if offset < self.base_offset {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "offset {} is below bucket base {}",
                    offset, self.base_offset
                ),
            });
        }
        Ok(offset - self.base_offset)
    }

    /// This bucket's index in the device's address space.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// First device-global offset covered by this bucket.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Last device-global offset covered by this bucket.
    pub fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle has been released.
    pub fn is_closed(&self) -> bool {
        self.handle.lock().is_none()
    }

    /// Current physical length of the backing file. May be shorter than the
    /// bucket size — that is a storage optimization, never an error.
    pub fn physical_len(&self) -> StorageResult<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}
