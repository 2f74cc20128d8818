//! ShardCache - embeddable tenant-partitioned SQLite cache
//!
//! This library provides a process-local key-value cache for serverless
//! database front-ends. Cached rows are stored in per-tenant SQLite files
//! versioned by an opaque freshness token; a write in a tenant's slice of
//! the upstream store rotates the token and invalidates that tenant's
//! cache file wholesale.
//!
//! # High-Level API
//!
//! The [`manager`] module provides the orchestrating facade:
//!
//! ```no_run
//! use shardcache::manager::CacheManager;
//!
//! # fn main() -> Result<(), shardcache::error::CacheError> {
//! let cache = CacheManager::new();
//! cache.init("./cache", 100, 0.8)?;
//!
//! cache.set("users", "tenant1", "fresh1", "user123", b"payload")?;
//! let bytes = cache.get("users", "tenant1", "fresh1", "user123")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod eviction;
pub mod handles;
pub mod logging;
pub mod manager;
pub mod path;
pub mod stats;
pub mod store;
pub mod sweep;

pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use manager::CacheManager;
pub use stats::CacheStats;

/// Version of the ShardCache library and front-ends.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
