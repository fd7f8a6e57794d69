//! Core types and configuration for the image cache.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default maximum number of decoded images held in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 50;

/// Default age after which disk entries are swept (7 days).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default JPEG quality for re-encoded disk entries.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Cache-related errors.
///
/// These never cross the orchestrator boundary: every failure mode degrades
/// to a cache miss or an absent result at the public API.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode or encode failure
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

/// Memory tier configuration.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries (default: 50)
    pub max_entries: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

/// Disk tier configuration.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Cache directory root
    pub cache_dir: PathBuf,
    /// Entries older than this are removed by the expiration sweep
    pub max_age: Duration,
    /// Interval between periodic sweeps; `None` sweeps once at startup only
    pub sweep_interval: Option<Duration>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photostash");

        Self {
            cache_dir,
            max_age: DEFAULT_MAX_AGE,
            sweep_interval: None,
        }
    }
}

/// Complete image cache configuration.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Memory tier configuration
    pub memory: MemoryCacheConfig,
    /// Disk tier configuration
    pub disk: DiskCacheConfig,
    /// JPEG quality (1-100) for re-encoded disk entries
    pub jpeg_quality: u8,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryCacheConfig::default(),
            disk: DiskCacheConfig::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageCacheConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory tier entry cap.
    pub fn with_memory_capacity(mut self, max_entries: usize) -> Self {
        self.memory.max_entries = max_entries;
        self
    }

    /// Set the disk cache directory.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.disk.cache_dir = dir;
        self
    }

    /// Set the maximum age for disk entries.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.disk.max_age = max_age;
        self
    }

    /// Enable periodic expiration sweeps at the given interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.disk.sweep_interval = Some(interval);
        self
    }

    /// Set the JPEG quality used when persisting images.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }
}
