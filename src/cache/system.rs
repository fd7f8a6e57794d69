//! Cache orchestrator composing the memory and disk tiers with network
//! fallback.
//!
//! Lookup strategy:
//! 1. Check the memory tier (fast, decoded images)
//! 2. If miss, check the disk tier; a hit is decoded and promoted to memory
//! 3. If miss, fetch from the network, then populate both tiers
//!
//! Every internal failure degrades to a miss or an absent result; callers
//! never see an error. A broken cache behaves like "always fetch".

use crate::cache::disk::DiskCache;
use crate::cache::key::CacheKey;
use crate::cache::memory::MemoryCache;
use crate::cache::stats::CacheStats;
use crate::cache::sweep::run_sweep_daemon;
use crate::cache::types::{CacheError, ImageCacheConfig};
use crate::fetch::ImageFetcher;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Two-tier image cache with read-through network fallback.
///
/// Constructed once at application startup and passed to the components
/// that load images; there is no global instance. Dropping the cache stops
/// its background sweep daemon.
///
/// # Example
///
/// ```ignore
/// use photostash::cache::{ImageCache, ImageCacheConfig};
/// use photostash::fetch::HttpImageFetcher;
///
/// let cache = ImageCache::start(ImageCacheConfig::new(), HttpImageFetcher::new()?).await?;
///
/// if let Some(image) = cache.load_image("https://img.example/photo.jpg").await {
///     // first call downloads; later calls are served from cache
/// }
/// ```
pub struct ImageCache<F> {
    /// Memory tier (fast, volatile)
    memory: Arc<MemoryCache>,
    /// Disk tier (persistent)
    disk: Arc<DiskCache>,
    /// Network fallback
    fetcher: F,
    /// Quality for JPEG re-encoding of persisted entries
    jpeg_quality: u8,
    /// Download statistics; tier stats live with each tier
    stats: Mutex<CacheStats>,
    /// Cancels the sweep daemon when the cache is dropped
    _sweep_guard: DropGuard,
}

impl<F: ImageFetcher> ImageCache<F> {
    /// Start the cache: create the tiers and spawn the expiration sweep.
    ///
    /// Must be called within a tokio runtime. The sweep runs once
    /// immediately and, if the configuration sets an interval, periodically
    /// thereafter.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub async fn start(config: ImageCacheConfig, fetcher: F) -> Result<Self, CacheError> {
        let memory = Arc::new(MemoryCache::new(config.memory.max_entries));
        let disk = Arc::new(DiskCache::new(config.disk.cache_dir.clone())?);

        let cancellation = CancellationToken::new();
        tokio::spawn(run_sweep_daemon(
            Arc::clone(&disk),
            config.disk.max_age,
            config.disk.sweep_interval,
            cancellation.clone(),
        ));

        debug!(
            dir = %config.disk.cache_dir.display(),
            memory_capacity = config.memory.max_entries,
            max_age_secs = config.disk.max_age.as_secs(),
            "image cache started"
        );

        Ok(Self {
            memory,
            disk,
            fetcher,
            jpeg_quality: config.jpeg_quality,
            stats: Mutex::new(CacheStats::new()),
            _sweep_guard: cancellation.drop_guard(),
        })
    }

    /// Get an image from the cache tiers only; never touches the network.
    ///
    /// A disk hit is decoded and promoted into memory. Performs blocking
    /// I/O on the calling thread; use [`load_image`] on async paths.
    ///
    /// [`load_image`]: ImageCache::load_image
    pub fn get(&self, locator: &str) -> Option<Arc<DynamicImage>> {
        let key = CacheKey::from_locator(locator);
        self.memory
            .get(&key)
            .or_else(|| disk_lookup(&self.memory, &self.disk, &key))
    }

    /// Store an image in both tiers.
    ///
    /// The memory tier is updated immediately; the disk write is re-encoded
    /// to JPEG and queued in the background.
    pub fn set(&self, locator: &str, image: DynamicImage) {
        let key = CacheKey::from_locator(locator);
        self.insert(key, Arc::new(image));
    }

    /// Load an image, falling back to the network on a full cache miss.
    ///
    /// Returns `None` only when the image is in neither tier and the fetch
    /// fails or yields undecodable bytes; nothing is cached in that case,
    /// so a later call retries the network. Concurrent calls for the same
    /// locator may each fetch independently; both populate equivalent
    /// entries.
    pub async fn load_image(&self, locator: &str) -> Option<Arc<DynamicImage>> {
        let key = CacheKey::from_locator(locator);

        if let Some(image) = self.memory.get(&key) {
            return Some(image);
        }

        // Disk read and decode are blocking; keep them off async threads.
        let memory = Arc::clone(&self.memory);
        let disk = Arc::clone(&self.disk);
        let lookup_key = key.clone();
        let disk_hit = tokio::task::spawn_blocking(move || {
            disk_lookup(&memory, &disk, &lookup_key)
        })
        .await
        .ok()
        .flatten();

        if let Some(image) = disk_hit {
            return Some(image);
        }

        // Full miss: fetch, decode, populate both tiers.
        let bytes = match self.fetcher.fetch(locator).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(locator = locator, error = %e, "image fetch failed");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_download_failure();
                }
                return None;
            }
        };

        let byte_count = bytes.len() as u64;
        let image = match image::load_from_memory(&bytes) {
            Ok(image) => Arc::new(image),
            Err(e) => {
                warn!(locator = locator, error = %e, "fetched payload is not a decodable image");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_download_failure();
                }
                return None;
            }
        };

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_download(byte_count);
        }

        self.insert(key, Arc::clone(&image));
        Some(image)
    }

    /// Remove every entry from both tiers.
    ///
    /// The memory tier is always emptied. A disk tier that cannot be
    /// cleared is logged and left for the expiration sweep; callers never
    /// see the failure.
    pub async fn clear(&self) {
        self.memory.clear();
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "failed to clear disk cache tier");
        }
    }

    /// Wait until all queued disk writes have been attempted.
    ///
    /// Tests use this for deterministic assertions about the disk tier;
    /// production callers may use it for a durability point.
    pub async fn flush(&self) {
        self.disk.flush().await;
    }

    /// Flush pending disk writes and stop the background sweep.
    pub async fn shutdown(self) {
        self.disk.flush().await;
        // Dropping self cancels the sweep daemon via the drop guard.
    }

    /// Combined statistics across both tiers.
    pub fn stats(&self) -> CacheStats {
        let memory = self.memory.stats();
        let disk = self.disk.stats();
        let own = self.stats.lock().unwrap().clone();

        CacheStats {
            memory_hits: memory.memory_hits,
            memory_misses: memory.memory_misses,
            memory_entry_count: memory.memory_entry_count,
            memory_evictions: memory.memory_evictions,
            disk_hits: disk.disk_hits,
            disk_misses: disk.disk_misses,
            disk_writes: disk.disk_writes,
            disk_write_failures: disk.disk_write_failures,
            downloads: own.downloads,
            download_failures: own.download_failures,
            bytes_downloaded: own.bytes_downloaded,
            created_at: own.created_at,
        }
    }

    /// Number of images currently in the memory tier.
    pub fn memory_entry_count(&self) -> usize {
        self.memory.entry_count()
    }

    /// Number of files currently in the disk tier.
    pub fn disk_entry_count(&self) -> usize {
        self.disk.entry_count()
    }

    /// Populate both tiers with an already-decoded image.
    fn insert(&self, key: CacheKey, image: Arc<DynamicImage>) {
        self.memory.put(key.clone(), Arc::clone(&image));

        match encode_jpeg(&image, self.jpeg_quality) {
            Ok(bytes) => self.disk.put(&key, bytes),
            Err(e) => {
                // Memory still holds the entry; only persistence is lost.
                warn!(key = %key, error = %e, "failed to encode image for disk tier");
            }
        }
    }
}

/// Disk-tier lookup with promotion into memory.
///
/// A file that no longer decodes is deleted so it cannot linger as a
/// permanent miss, then treated like any other miss.
fn disk_lookup(
    memory: &MemoryCache,
    disk: &DiskCache,
    key: &CacheKey,
) -> Option<Arc<DynamicImage>> {
    let bytes = disk.get(key)?;

    match image::load_from_memory(&bytes) {
        Ok(image) => {
            let image = Arc::new(image);
            memory.put(key.clone(), Arc::clone(&image));
            Some(image)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "deleting undecodable disk cache entry");
            disk.remove(key);
            None
        }
    }
}

/// Re-encode a decoded image as JPEG at the given quality.
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CacheError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode_image(&image.to_rgb8())?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MockFetcher;
    use crate::fetch::FetchError;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const PHOTO_URL: &str = "https://img.example/photo.jpg";

    /// Mock fetcher that counts invocations.
    struct CountingFetcher {
        response: Result<Vec<u8>, FetchError>,
        calls: Arc<AtomicUsize>,
    }

    impl ImageFetcher for CountingFetcher {
        fn fetch(&self, _url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            async move { response }
        }
    }

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::ImageBuffer::from_pixel(
            w,
            h,
            image::Rgb([180u8, 70, 40]),
        ))
    }

    fn jpeg_bytes(image: &DynamicImage) -> Vec<u8> {
        encode_jpeg(image, 80).unwrap()
    }

    /// Compare images within a per-channel tolerance for JPEG loss.
    fn assert_images_close(a: &DynamicImage, b: &DynamicImage) {
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());

        let a = a.to_rgb8();
        let b = b.to_rgb8();
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            for c in 0..3 {
                let delta = (pa.0[c] as i16 - pb.0[c] as i16).abs();
                assert!(delta <= 12, "channel delta {} exceeds tolerance", delta);
            }
        }
    }

    async fn create_cache(
        fetcher: MockFetcher,
    ) -> (ImageCache<MockFetcher>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = ImageCacheConfig::new()
            .with_cache_dir(temp_dir.path().to_path_buf())
            .with_memory_capacity(10);
        let cache = ImageCache::start(config, fetcher).await.unwrap();
        (cache, temp_dir)
    }

    fn unreachable_fetcher() -> MockFetcher {
        MockFetcher {
            response: Err(FetchError::Http("should not be called".to_string())),
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (cache, _temp) = create_cache(unreachable_fetcher()).await;
        let original = test_image(10, 10);

        cache.set(PHOTO_URL, original.clone());

        let retrieved = cache.get(PHOTO_URL).expect("image is cached");
        assert_images_close(&retrieved, &original);
    }

    #[tokio::test]
    async fn test_get_miss() {
        let (cache, _temp) = create_cache(unreachable_fetcher()).await;
        assert!(cache.get(PHOTO_URL).is_none());
    }

    #[tokio::test]
    async fn test_disk_hit_promotes_to_memory() {
        let (cache, _temp) = create_cache(unreachable_fetcher()).await;
        let original = test_image(10, 10);

        cache.set(PHOTO_URL, original.clone());
        cache.flush().await;

        // Simulate memory pressure: the entry survives only on disk.
        cache.memory.clear();
        assert_eq!(cache.memory_entry_count(), 0);
        assert_eq!(cache.disk_entry_count(), 1);

        let retrieved = cache.load_image(PHOTO_URL).await.expect("disk hit");
        assert_images_close(&retrieved, &original);
        assert_eq!(cache.memory_entry_count(), 1, "disk hit is promoted");
    }

    #[tokio::test]
    async fn test_clear_empties_both_tiers() {
        let (cache, _temp) = create_cache(unreachable_fetcher()).await;

        cache.set(PHOTO_URL, test_image(10, 10));
        cache.flush().await;
        assert_eq!(cache.disk_entry_count(), 1);

        cache.clear().await;
        assert!(cache.get(PHOTO_URL).is_none());
        assert_eq!(cache.memory_entry_count(), 0);
        assert_eq!(cache.disk_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_is_fail_soft_when_cache_dir_is_gone() {
        let (cache, temp) = create_cache(unreachable_fetcher()).await;
        cache.set(PHOTO_URL, test_image(10, 10));
        cache.flush().await;

        // Pull the directory out from under the cache; clear must not
        // surface the failure and must still empty the memory tier.
        std::fs::remove_dir_all(temp.path()).unwrap();
        cache.clear().await;

        assert_eq!(cache.memory_entry_count(), 0);
        assert!(cache.get(PHOTO_URL).is_none());
    }

    #[tokio::test]
    async fn test_load_image_fetches_once_and_populates_both_tiers() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            response: Ok(jpeg_bytes(&test_image(10, 10))),
            calls: Arc::clone(&calls),
        };

        let config = ImageCacheConfig::new().with_cache_dir(temp_dir.path().to_path_buf());
        let cache = ImageCache::start(config, fetcher).await.unwrap();

        let image = cache.load_image(PHOTO_URL).await.expect("fetched image");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(image.width(), 10);

        // Both tiers now hold the entry; no second fetch.
        cache.flush().await;
        assert_eq!(cache.memory_entry_count(), 1);
        assert_eq!(cache.disk_entry_count(), 1);

        cache.load_image(PHOTO_URL).await.expect("cache hit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.downloads, 1);
        assert!(stats.bytes_downloaded > 0);
    }

    #[tokio::test]
    async fn test_load_image_fail_soft_on_fetch_failure() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            response: Err(FetchError::Http("connection refused".to_string())),
            calls: Arc::clone(&calls),
        };

        let config = ImageCacheConfig::new().with_cache_dir(temp_dir.path().to_path_buf());
        let cache = ImageCache::start(config, fetcher).await.unwrap();

        assert!(cache.load_image(PHOTO_URL).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Nothing was cached, so the next call retries the network.
        cache.flush().await;
        assert_eq!(cache.memory_entry_count(), 0);
        assert_eq!(cache.disk_entry_count(), 0);

        assert!(cache.load_image(PHOTO_URL).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().download_failures, 2);
    }

    #[tokio::test]
    async fn test_load_image_rejects_undecodable_payload() {
        let fetcher = MockFetcher {
            response: Ok(vec![0xde, 0xad, 0xbe, 0xef]),
        };
        let (cache, _temp) = create_cache(fetcher).await;

        assert!(cache.load_image(PHOTO_URL).await.is_none());
        cache.flush().await;
        assert_eq!(cache.memory_entry_count(), 0);
        assert_eq!(cache.disk_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_disk_entry_is_deleted() {
        let (cache, _temp) = create_cache(unreachable_fetcher()).await;
        let key = CacheKey::from_locator(PHOTO_URL);

        std::fs::write(cache.disk.path_for(&key), b"not an image").unwrap();
        assert_eq!(cache.disk_entry_count(), 1);

        assert!(cache.get(PHOTO_URL).is_none());
        assert_eq!(cache.disk_entry_count(), 0, "corrupt file is removed");
    }

    #[tokio::test]
    async fn test_memory_capacity_bound() {
        let temp_dir = TempDir::new().unwrap();
        let config = ImageCacheConfig::new()
            .with_cache_dir(temp_dir.path().to_path_buf())
            .with_memory_capacity(3);
        let cache = ImageCache::start(config, unreachable_fetcher())
            .await
            .unwrap();

        for i in 0..10 {
            cache.set(&format!("https://img.example/p{}.jpg", i), test_image(4, 4));
        }

        assert_eq!(cache.memory_entry_count(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_writes() {
        let temp_dir = TempDir::new().unwrap();
        let config = ImageCacheConfig::new().with_cache_dir(temp_dir.path().to_path_buf());
        let cache = ImageCache::start(config, unreachable_fetcher())
            .await
            .unwrap();

        cache.set(PHOTO_URL, test_image(10, 10));
        cache.shutdown().await;

        let files: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_encode_jpeg_round_trips_within_tolerance() {
        let original = test_image(10, 10);
        let bytes = encode_jpeg(&original, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_images_close(&decoded, &original);
    }
}
