//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Cache statistics for monitoring and debugging.
///
/// Maintained by each tier under its own lock; the orchestrator merges them
/// on demand. Purely observational, never part of the functional contract.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory tier metrics
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,

    // Disk tier metrics
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_writes: u64,
    pub disk_write_failures: u64,

    // Download metrics
    pub downloads: u64,
    pub download_failures: u64,
    pub bytes_downloaded: u64,

    // Timing
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            disk_hits: 0,
            disk_misses: 0,
            disk_writes: 0,
            disk_write_failures: 0,
            downloads: 0,
            download_failures: 0,
            bytes_downloaded: 0,
            created_at: Instant::now(),
        }
    }

    /// Calculate memory tier hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64
        }
    }

    /// Calculate disk tier hit rate (0.0 to 1.0).
    pub fn disk_hit_rate(&self) -> f64 {
        let total = self.disk_hits + self.disk_misses;
        if total == 0 {
            0.0
        } else {
            self.disk_hits as f64 / total as f64
        }
    }

    /// Calculate overall cache hit rate (0.0 to 1.0).
    ///
    /// A request counts as a hit when either tier served it.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.disk_misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get the uptime duration since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Record a memory tier hit.
    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    /// Record a memory tier miss.
    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    /// Record memory tier evictions.
    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    /// Record a disk tier hit.
    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    /// Record a disk tier miss.
    pub fn record_disk_miss(&mut self) {
        self.disk_misses += 1;
    }

    /// Record a completed disk write.
    pub fn record_disk_write(&mut self) {
        self.disk_writes += 1;
    }

    /// Record a failed or dropped disk write.
    pub fn record_disk_write_failure(&mut self) {
        self.disk_write_failures += 1;
    }

    /// Record a successful download.
    pub fn record_download(&mut self, bytes: u64) {
        self.downloads += 1;
        self.bytes_downloaded += bytes;
    }

    /// Record a failed download.
    pub fn record_download_failure(&mut self) {
        self.download_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zeroed() {
        let stats = CacheStats::new();
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_misses, 0);
        assert_eq!(stats.downloads, 0);
    }

    #[test]
    fn test_memory_hit_rate() {
        let mut stats = CacheStats::new();
        assert_eq!(stats.memory_hit_rate(), 0.0);

        stats.record_memory_hit();
        stats.record_memory_hit();
        stats.record_memory_hit();
        stats.record_memory_miss();

        assert!((stats.memory_hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disk_hit_rate() {
        let mut stats = CacheStats::new();
        stats.record_disk_hit();
        stats.record_disk_miss();

        assert!((stats.disk_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overall_hit_rate_counts_both_tiers() {
        let mut stats = CacheStats::new();
        stats.record_memory_hit();
        stats.record_disk_hit();
        stats.record_disk_miss();
        stats.record_disk_miss();

        // 2 hits out of 4 terminal outcomes
        assert!((stats.overall_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_download_accumulates_bytes() {
        let mut stats = CacheStats::new();
        stats.record_download(1000);
        stats.record_download(500);
        stats.record_download_failure();

        assert_eq!(stats.downloads, 2);
        assert_eq!(stats.bytes_downloaded, 1500);
        assert_eq!(stats.download_failures, 1);
    }
}
