//! Staleness sweeping of superseded cache files.
//!
//! A tenant's cache files are versioned by freshness token; at most one
//! token is current at a time. The sweeper removes every sibling file in
//! a tenant directory whose token differs from the current one, evicting
//! its handle first so no operation can revive a file queued for
//! deletion.
//!
//! Sweeping runs on the miss path of `get` and `set`. It is the mechanism
//! that frees disk space after tenant writes in the upstream database, so
//! it must not be skipped even though the lookup itself already missed.

use crate::error::{CacheError, Result};
use crate::handles::HandleTable;
use crate::path::{CACHE_FILE_SUFFIX, KEY_SEPARATOR};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Delete every cache file in `tenant_dir` whose freshness token differs
/// from `current_freshness`, evicting handles as it goes.
///
/// A missing tenant directory is a no-op success. Unlink errors are
/// recorded but do not abort the sweep; the first one is returned after
/// the loop completes. Races against concurrent deletion are ignored.
///
/// Returns the number of files removed.
pub(crate) fn sweep_stale(
    handles: &HandleTable,
    table: &str,
    tenant: &str,
    tenant_dir: &Path,
    current_freshness: &str,
) -> Result<u64> {
    let entries = match fs::read_dir(tenant_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };

    let mut removed = 0u64;
    let mut first_error: Option<CacheError> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let token = match path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(&format!(".{}", CACHE_FILE_SUFFIX)))
        {
            Some(token) => token,
            // Foreign files are not ours to delete.
            None => continue,
        };

        if token == current_freshness {
            continue;
        }

        let key = format!(
            "{table}{sep}{tenant}{sep}{token}",
            sep = KEY_SEPARATOR
        );
        handles.evict(&key);

        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                debug!(path = %path.display(), "stale cache file removed");
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // Lost a race with a concurrent sweep or delete.
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove stale cache file");
                if first_error.is_none() {
                    first_error = Some(err.into());
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(removed),
    }
}
