//! photostash - two-tier image cache for remote photos.
//!
//! This library provides a read-through cache for images fetched over HTTP:
//! a bounded in-memory LRU of decoded images backed by a persistent on-disk
//! store of re-encoded JPEG bytes. Lookups check memory, then disk
//! (promoting disk hits into memory), and only on a full miss reach the
//! network. Disk entries expire after a configurable age via a background
//! sweep.
//!
//! The cache is deliberately fail-soft: storage and network failures degrade
//! to cache misses or absent results, never to errors at the public API.
//!
//! # High-Level API
//!
//! ```ignore
//! use photostash::cache::{ImageCache, ImageCacheConfig};
//! use photostash::fetch::HttpImageFetcher;
//!
//! let config = ImageCacheConfig::new();
//! let cache = ImageCache::start(config, HttpImageFetcher::new()?).await?;
//!
//! if let Some(image) = cache.load_image("https://img.example/photo.jpg").await {
//!     // display the image
//! }
//! ```

pub mod cache;
pub mod fetch;
pub mod logging;

/// Version of the photostash library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
