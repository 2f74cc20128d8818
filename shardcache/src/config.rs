//! Cache configuration and validation.

use crate::error::{CacheError, Result};
use std::path::{Path, PathBuf};

/// Upper bound on the retention fraction used by the LRU culler.
pub const MAX_CAP: f64 = 0.95;

/// SQLite page size applied to every cache file, in bytes.
pub const PAGE_SIZE: u64 = 4096;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Engine configuration, created once per `init` and immutable until
/// `close`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for all cache files.
    pub base_dir: PathBuf,
    /// Per-file size ceiling in MiB.
    pub max_size_mb: u64,
    /// Fraction of rows retained by an LRU cull, in `[0, MAX_CAP]`.
    pub cap: f64,
}

impl CacheConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `cap` is not a finite number in
    /// `[0, 0.95]` or `max_size_mb` is zero.
    pub fn new(base_dir: impl Into<PathBuf>, max_size_mb: u64, cap: f64) -> Result<Self> {
        if !cap.is_finite() || !(0.0..=MAX_CAP).contains(&cap) {
            return Err(CacheError::InvalidArgument(format!(
                "cap must be between 0 and {}, got {}",
                MAX_CAP, cap
            )));
        }
        if max_size_mb == 0 {
            return Err(CacheError::InvalidArgument(
                "max_size must be a positive number of MiB".to_string(),
            ));
        }

        Ok(Self {
            base_dir: base_dir.into(),
            max_size_mb,
            cap,
        })
    }

    /// Root directory for all cache files.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Per-file size ceiling in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * BYTES_PER_MIB
    }

    /// SQLite page-count ceiling for a cache file.
    ///
    /// Sized at twice the configured ceiling so the LRU cull is the normal
    /// enforcement mechanism while a runaway file still hits `SQLITE_FULL`.
    pub fn max_page_count(&self) -> u64 {
        (self.max_size_bytes() * 2) / PAGE_SIZE
    }
}
