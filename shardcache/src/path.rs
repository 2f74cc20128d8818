//! Cache file path resolution and handle key encoding.
//!
//! Pure functions from the logical key components to filesystem paths and
//! handle-table keys:
//!
//! ```text
//! <base_dir>/<table>/<tenant>/<freshness>.db      (path)
//! <table>:<tenant>:<freshness>                    (handle key)
//! ```
//!
//! Every component is validated before use; a component that could escape
//! `base_dir` or break the key encoding is rejected with `InvalidArgument`.

use crate::error::{CacheError, Result};
use std::path::{Path, PathBuf};

/// Constant filename suffix for cache files.
pub const CACHE_FILE_SUFFIX: &str = "db";

/// Separator used in handle keys. Forbidden in key components so the
/// encoding stays injective.
pub const KEY_SEPARATOR: char = ':';

/// Validate one logical key component.
///
/// Rejects empty strings, path separators, NUL, the `.`/`..` traversal
/// names, and the handle-key separator.
fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CacheError::InvalidArgument(format!("{} must not be empty", name)));
    }
    if value == "." || value == ".." {
        return Err(CacheError::InvalidArgument(format!(
            "{} must not be a directory traversal sequence",
            name
        )));
    }
    if value.contains(['/', '\\', '\0', KEY_SEPARATOR]) {
        return Err(CacheError::InvalidArgument(format!(
            "{} contains a forbidden character: {:?}",
            name, value
        )));
    }
    Ok(())
}

/// Validate a bind (the row-level key inside a cache file).
///
/// Binds never touch the filesystem, so the handle-key separator is
/// allowed; the path-escape rules still apply.
pub(crate) fn validate_bind(bind: &str) -> Result<()> {
    if bind.is_empty() {
        return Err(CacheError::InvalidArgument("bind must not be empty".to_string()));
    }
    if bind == "." || bind == ".." {
        return Err(CacheError::InvalidArgument(
            "bind must not be a directory traversal sequence".to_string(),
        ));
    }
    if bind.contains(['/', '\\', '\0']) {
        return Err(CacheError::InvalidArgument(format!(
            "bind contains a forbidden character: {:?}",
            bind
        )));
    }
    Ok(())
}

/// Construct the full path of a cache file.
///
/// # Example
///
/// ```
/// use std::path::{Path, PathBuf};
/// use shardcache::path::cache_file_path;
///
/// let path = cache_file_path(Path::new("/cache"), "users", "t1", "f1").unwrap();
/// assert_eq!(path, PathBuf::from("/cache/users/t1/f1.db"));
/// ```
///
/// # Errors
///
/// Returns `InvalidArgument` if any component fails validation.
pub fn cache_file_path(
    base_dir: &Path,
    table: &str,
    tenant: &str,
    freshness: &str,
) -> Result<PathBuf> {
    validate_component("table", table)?;
    validate_component("tenant", tenant)?;
    validate_component("freshness", freshness)?;

    Ok(base_dir
        .join(table)
        .join(tenant)
        .join(format!("{}.{}", freshness, CACHE_FILE_SUFFIX)))
}

/// Directory holding every freshness file for one tenant.
pub fn tenant_directory(base_dir: &Path, table: &str, tenant: &str) -> Result<PathBuf> {
    validate_component("table", table)?;
    validate_component("tenant", tenant)?;
    Ok(base_dir.join(table).join(tenant))
}

/// Directory holding every tenant of one table.
pub fn table_directory(base_dir: &Path, table: &str) -> Result<PathBuf> {
    validate_component("table", table)?;
    Ok(base_dir.join(table))
}

/// Stable, injective handle-table key for a cache file.
pub fn handle_key(table: &str, tenant: &str, freshness: &str) -> Result<String> {
    validate_component("table", table)?;
    validate_component("tenant", tenant)?;
    validate_component("freshness", freshness)?;
    Ok(format!(
        "{table}{sep}{tenant}{sep}{freshness}",
        sep = KEY_SEPARATOR
    ))
}

/// Handle-key prefix matching every file of one table.
///
/// The trailing separator keeps `foo` from matching entries of a table
/// named `foobar`.
pub fn table_key_prefix(table: &str) -> String {
    format!("{}{}", table, KEY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_path_layout() {
        let path = cache_file_path(Path::new("/cache"), "users", "t1", "f1").unwrap();
        assert_eq!(path, PathBuf::from("/cache/users/t1/f1.db"));
    }

    #[test]
    fn test_tenant_directory() {
        let dir = tenant_directory(Path::new("/cache"), "users", "t1").unwrap();
        assert_eq!(dir, PathBuf::from("/cache/users/t1"));
    }

    #[test]
    fn test_table_directory() {
        let dir = table_directory(Path::new("/cache"), "users").unwrap();
        assert_eq!(dir, PathBuf::from("/cache/users"));
    }

    #[test]
    fn test_handle_key_encoding() {
        let key = handle_key("users", "t1", "f1").unwrap();
        assert_eq!(key, "users:t1:f1");
    }

    #[test]
    fn test_handle_key_is_injective_across_components() {
        // Separator is forbidden inside components, so two different
        // component splits can never encode to the same key.
        assert!(handle_key("a:b", "c", "d").is_err());
        assert!(handle_key("a", "b:c", "d").is_err());
    }

    #[test]
    fn test_table_key_prefix_guards_sibling_tables() {
        let prefix = table_key_prefix("foo");
        assert!(handle_key("foo", "t", "f").unwrap().starts_with(&prefix));
        assert!(!handle_key("foobar", "t", "f").unwrap().starts_with(&prefix));
    }

    #[test]
    fn test_rejects_path_separators() {
        let base = Path::new("/cache");
        assert!(cache_file_path(base, "users/evil", "t1", "f1").is_err());
        assert!(cache_file_path(base, "users", "t1\\evil", "f1").is_err());
        assert!(cache_file_path(base, "users", "t1", "f/1").is_err());
    }

    #[test]
    fn test_rejects_traversal_sequences() {
        let base = Path::new("/cache");
        assert!(cache_file_path(base, "..", "t1", "f1").is_err());
        assert!(cache_file_path(base, "users", ".", "f1").is_err());
        assert!(cache_file_path(base, "users", "t1", "..").is_err());
    }

    #[test]
    fn test_rejects_empty_and_nul_components() {
        let base = Path::new("/cache");
        assert!(cache_file_path(base, "", "t1", "f1").is_err());
        assert!(cache_file_path(base, "users", "", "f1").is_err());
        assert!(cache_file_path(base, "users", "t1", "f\01").is_err());
    }

    #[test]
    fn test_bind_allows_separator_but_not_paths() {
        assert!(validate_bind("users:123:profile").is_ok());
        assert!(validate_bind("").is_err());
        assert!(validate_bind("a/b").is_err());
        assert!(validate_bind("..").is_err());
    }

    #[test]
    fn test_freshness_is_opaque() {
        // Non-numeric tokens such as content hashes are first-class.
        let path = cache_file_path(Path::new("/cache"), "users", "t1", "sha256-abcdef").unwrap();
        assert_eq!(path, PathBuf::from("/cache/users/t1/sha256-abcdef.db"));
    }
}
