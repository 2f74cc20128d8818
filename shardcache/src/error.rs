//! Error taxonomy for cache operations.
//!
//! A `Miss` is not a failure in the semantic sense; it is surfaced as its
//! own variant so front-ends can report it distinctly instead of logging
//! it as an error.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Malformed input: cap out of range, empty or path-escaping key
    /// component, unparsable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation issued before `init` or after `close`.
    #[error("cache not initialized")]
    NotInitialized,

    /// Requested entry or cache file not present.
    #[error("cache miss: {0}")]
    Miss(String),

    /// Filesystem failure (permissions, missing parent, unlink failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file engine reports out-of-space.
    #[error("disk full: {0}")]
    DiskFull(String),

    /// The file engine reports a malformed database. The file is treated
    /// as a miss and unlinked on the next sweep.
    #[error("corrupt cache file: {0}")]
    Corrupt(String),

    /// Any other unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Canonical disk-full message fragments across platforms and engines.
///
/// SQLite reports `SQLITE_FULL` with varying text depending on the build;
/// the OS-level wording differs again. Matched case-insensitively.
const DISK_FULL_FRAGMENTS: &[&str] = &[
    "disk full",
    "database or disk is full",
    "no space left on device",
    "insufficient disk space",
];

/// Check whether an engine error message indicates an out-of-space
/// condition.
pub fn is_disk_full_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    DISK_FULL_FRAGMENTS.iter().any(|f| lower.contains(f))
}

impl From<rusqlite::Error> for CacheError {
    /// Classify an engine error into the cache taxonomy.
    ///
    /// `QueryReturnedNoRows` is intentionally not handled here; the store
    /// maps it to `Miss` at the call site where the missing row has a name.
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(inner, message) => {
                let text = message
                    .clone()
                    .unwrap_or_else(|| inner.to_string());
                match inner.code {
                    ErrorCode::DiskFull => CacheError::DiskFull(text),
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                        CacheError::Corrupt(text)
                    }
                    _ if is_disk_full_message(&text) => CacheError::DiskFull(text),
                    _ => CacheError::Internal(text),
                }
            }
            _ => CacheError::Internal(err.to_string()),
        }
    }
}
