//! Two-tier cache for remote images.
//!
//! Provides a bounded in-memory LRU of decoded images, a persistent disk
//! store of encoded bytes with age-based expiration, and an orchestrator
//! composing the tiers with read-through network fallback.

mod disk;
mod key;
mod memory;
mod stats;
mod sweep;
mod system;
mod types;

pub use disk::{DiskCache, SweepResult};
pub use key::CacheKey;
pub use memory::MemoryCache;
pub use stats::CacheStats;
pub use sweep::run_sweep_daemon;
pub use system::ImageCache;
pub use types::{
    CacheError, DiskCacheConfig, ImageCacheConfig, MemoryCacheConfig, DEFAULT_JPEG_QUALITY,
    DEFAULT_MAX_AGE, DEFAULT_MEMORY_CAPACITY,
};
