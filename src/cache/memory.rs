//! In-memory tier with LRU eviction.

use crate::cache::key::CacheKey;
use crate::cache::stats::CacheStats;
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Entry in the memory tier.
struct MemoryEntry {
    /// Decoded image, shared with callers
    image: Arc<DynamicImage>,
    /// Monotonic access stamp for LRU ordering
    last_used: u64,
}

/// Bounded in-memory store of decoded images.
///
/// Holds at most `capacity` entries; inserting beyond that evicts the least
/// recently used entry first, never the one being inserted. All operations
/// are synchronous, perform no I/O, and are safe under concurrent access.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    capacity: usize,
    stats: Mutex<CacheStats>,
}

struct Inner {
    entries: HashMap<CacheKey, MemoryEntry>,
    /// Monotonic counter; bumped on every get and put
    tick: u64,
}

impl MemoryCache {
    /// Create a memory cache holding at most `capacity` images.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Get a cached image, refreshing its recency.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.entries.get_mut(key) {
            entry.last_used = tick;
            let image = Arc::clone(&entry.image);

            if let Ok(mut stats) = self.stats.lock() {
                stats.record_memory_hit();
            }
            Some(image)
        } else {
            if let Ok(mut stats) = self.stats.lock() {
                stats.record_memory_miss();
            }
            None
        }
    }

    /// Insert an image, evicting the least recently used entry if the cache
    /// is at capacity.
    pub fn put(&self, key: CacheKey, image: Arc<DynamicImage>) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        let mut evicted = 0u64;
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            // Victim: smallest access stamp. The table is small (tens of
            // entries), so a scan beats maintaining an order structure.
            if let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&victim);
                evicted = 1;
            }
        }

        inner.entries.insert(
            key,
            MemoryEntry {
                image,
                last_used: tick,
            },
        );

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_memory_eviction(evicted);
            stats.memory_entry_count = inner.entries.len();
        }
    }

    /// Check if a key is present without refreshing recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.entries.contains_key(key)
    }

    /// Current number of entries.
    pub fn entry_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.entries.len()
    }

    /// Configured maximum entry count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a snapshot of the tier statistics.
    pub fn stats(&self) -> CacheStats {
        let stats = self.stats.lock().unwrap();
        stats.clone()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();

        if let Ok(mut stats) = self.stats.lock() {
            stats.memory_entry_count = 0;
        }
    }
}
