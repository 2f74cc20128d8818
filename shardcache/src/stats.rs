//! Cache statistics tracking.

use std::time::Instant;

/// Counters for monitoring and debugging. Recorded by the manager; reset
/// on every `init`.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Lookups that returned content.
    pub hits: u64,
    /// Lookups that missed (absent file or absent bind).
    pub misses: u64,
    /// Successful writes.
    pub writes: u64,
    /// Rows removed by LRU culls.
    pub culled_rows: u64,
    /// Stale files removed by sweeps.
    pub swept_files: u64,
    /// When tracking started.
    pub created_at: Instant,
}

impl CacheStats {
    /// Create a zeroed statistics tracker.
    pub fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            writes: 0,
            culled_rows: 0,
            swept_files: 0,
            created_at: Instant::now(),
        }
    }

    /// Lookup hit rate in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Time elapsed since tracking started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_culled(&mut self, rows: u64) {
        self.culled_rows += rows;
    }

    pub fn record_swept(&mut self, files: u64) {
        self.swept_files += files;
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}
