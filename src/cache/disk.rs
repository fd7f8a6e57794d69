//! Disk tier: file-per-key store with background writes and age-based
//! expiration.
//!
//! # File Layout
//!
//! Entries live in a flat structure within the cache directory:
//! ```text
//! {cache_dir}/{encoded_key}
//! ```
//!
//! # Write Path
//!
//! `put` never blocks on the filesystem: writes are queued on a bounded
//! channel drained by a background worker task, so a `get` issued right
//! after a `put` for the same key may still miss. Tests call [`flush`] to
//! wait for queued writes instead of sleeping.
//!
//! [`flush`]: DiskCache::flush

use crate::cache::key::CacheKey;
use crate::cache::stats::CacheStats;
use crate::cache::types::CacheError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Maximum number of queued writes before new ones are dropped.
const WRITE_QUEUE_CAPACITY: usize = 64;

/// Work items for the background write worker.
enum WriteJob {
    Write { path: PathBuf, bytes: Vec<u8> },
    Flush(oneshot::Sender<()>),
}

/// Result of an expiration sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    /// Number of files deleted
    pub files_removed: usize,
    /// Number of files kept (fresh or unremovable)
    pub files_retained: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
    /// Duration of the sweep in milliseconds
    pub duration_ms: u64,
}

/// Persistent store of encoded image bytes, one file per key.
///
/// Reads are blocking and treat every failure as a miss. Writes are
/// fire-and-forget via the background worker. The worker stops when the
/// `DiskCache` is dropped and its channel closes.
pub struct DiskCache {
    /// Cache directory root
    directory: PathBuf,
    /// Channel to the write worker
    tx: mpsc::Sender<WriteJob>,
    /// Statistics, shared with the write worker
    stats: Arc<Mutex<CacheStats>>,
}

impl DiskCache {
    /// Create a disk cache rooted at `directory`, creating it if absent.
    ///
    /// Spawns the background write worker, so this must be called within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(directory: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&directory)?;

        let (tx, rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let stats = Arc::new(Mutex::new(CacheStats::new()));
        tokio::spawn(run_write_worker(rx, Arc::clone(&stats)));

        Ok(Self {
            directory,
            tx,
            stats,
        })
    }

    /// Path of the file backing a key.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.as_str())
    }

    /// The cache directory root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Read the bytes for a key.
    ///
    /// Blocking. Any failure (absent file, permissions, truncation) is a
    /// miss, never an error.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => {
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_disk_hit();
                }
                Some(bytes)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(key = %key, error = %e, "disk cache read failed");
                }
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_disk_miss();
                }
                None
            }
        }
    }

    /// Queue a write for a key and return immediately.
    ///
    /// The write completes in the background; there is no same-key
    /// write-then-read ordering guarantee. If the queue is full the write
    /// is dropped with a warning.
    pub fn put(&self, key: &CacheKey, bytes: Vec<u8>) {
        let job = WriteJob::Write {
            path: self.path_for(key),
            bytes,
        };

        if let Err(e) = self.tx.try_send(job) {
            warn!(key = %key, error = %e, "disk write queue rejected entry");
            if let Ok(mut stats) = self.stats.lock() {
                stats.record_disk_write_failure();
            }
        }
    }

    /// Wait until every previously queued write has been attempted.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteJob::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Delete the file backing a key, ignoring errors.
    ///
    /// Used by the orchestrator to drop entries that no longer decode.
    pub fn remove(&self, key: &CacheKey) {
        let _ = fs::remove_file(self.path_for(key));
    }

    /// Delete the entire cache directory and recreate it empty.
    ///
    /// Drains the write queue first so no queued write can land in the
    /// recreated directory.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.flush().await;
        fs::remove_dir_all(&self.directory)?;
        fs::create_dir_all(&self.directory)?;
        Ok(())
    }

    /// Number of files currently in the cache directory.
    pub fn entry_count(&self) -> usize {
        match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.path().is_file())
                .count(),
            Err(_) => 0,
        }
    }

    /// Get a snapshot of the tier statistics.
    pub fn stats(&self) -> CacheStats {
        let stats = self.stats.lock().unwrap();
        stats.clone()
    }

    /// Delete every file older than `max_age`, by modification time.
    ///
    /// Blocking; run under `spawn_blocking` on async paths. A file whose
    /// metadata cannot be read, or which cannot be deleted, is skipped and
    /// the sweep continues.
    pub fn sweep_expired(&self, max_age: Duration) -> SweepResult {
        let start = Instant::now();
        let mut result = SweepResult::default();

        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return result;
        };

        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    dir = %self.directory.display(),
                    error = %e,
                    "failed to read cache directory during sweep"
                );
                return result;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    result.files_retained += 1;
                    continue;
                }
            };
            let Ok(mtime) = metadata.modified() else {
                result.files_retained += 1;
                continue;
            };

            if mtime < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        result.files_removed += 1;
                        result.bytes_freed += metadata.len();
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "failed to delete expired file");
                        result.files_retained += 1;
                    }
                }
            } else {
                result.files_retained += 1;
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            files_removed = result.files_removed,
            files_retained = result.files_retained,
            bytes_freed = result.bytes_freed,
            duration_ms = result.duration_ms,
            "expiration sweep complete"
        );

        result
    }
}

/// Drain the write queue until every sender is dropped.
async fn run_write_worker(mut rx: mpsc::Receiver<WriteJob>, stats: Arc<Mutex<CacheStats>>) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Write { path, bytes } => match tokio::fs::write(&path, &bytes).await {
                Ok(()) => {
                    if let Ok(mut stats) = stats.lock() {
                        stats.record_disk_write();
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "disk cache write failed");
                    if let Ok(mut stats) = stats.lock() {
                        stats.record_disk_write_failure();
                    }
                }
            },
            WriteJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    debug!("disk write worker stopped");
}
