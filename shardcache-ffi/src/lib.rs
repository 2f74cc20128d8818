//! C-callable surface over the cache manager.
//!
//! Exported symbols carry the `shardcache_` prefix so they cannot shadow
//! libc symbols (`close`, `free`) when the library is loaded into a host
//! process.
//!
//! # Contract
//!
//! - Status codes: `SUCCESS = 1`, `ERROR_GENERAL = 0`, negative values
//!   for specific failures (see the constants below).
//! - `shardcache_get` returns a `malloc`ed buffer whose ownership
//!   transfers to the caller; release it with `shardcache_free_mem`. The
//!   `result_len` out-parameter carries the byte count on success or a
//!   negative status code on failure.
//! - All string arguments are NUL-terminated UTF-8. Null pointers fail
//!   with `ERROR_INVALID_ARG`.
//! - Panics never cross the boundary; they are reported as
//!   `ERROR_GENERAL`.

use shardcache::error::CacheError;
use shardcache::manager::CacheManager;
use std::ffi::{c_char, c_double, c_int, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

pub const SUCCESS: c_int = 1;
pub const ERROR_GENERAL: c_int = 0;
pub const ERROR_DISK_FULL: c_int = -1;
pub const ERROR_INVALID_ARG: c_int = -2;
pub const ERROR_NOT_FOUND: c_int = -3;
pub const ERROR_NOT_INIT: c_int = -4;

/// The process-wide manager. Its lifetime coincides with the loaded
/// library; `shardcache_close` returns it to the uninitialized state.
static MANAGER: CacheManager = CacheManager::new();

/// Map an engine error to its ABI status code.
fn status_code(err: &CacheError) -> c_int {
    match err {
        CacheError::InvalidArgument(_) => ERROR_INVALID_ARG,
        CacheError::NotInitialized => ERROR_NOT_INIT,
        CacheError::Miss(_) => ERROR_NOT_FOUND,
        CacheError::DiskFull(_) => ERROR_DISK_FULL,
        CacheError::Io(_) | CacheError::Corrupt(_) | CacheError::Internal(_) => ERROR_GENERAL,
    }
}

/// Borrow a NUL-terminated UTF-8 string from the caller.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
unsafe fn to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Run an operation, translating panics to `ERROR_GENERAL`.
fn guarded(op: impl FnOnce() -> c_int) -> c_int {
    catch_unwind(AssertUnwindSafe(op)).unwrap_or(ERROR_GENERAL)
}

/// Initialize (or reinitialize) the cache.
///
/// # Safety
///
/// `base_dir` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn shardcache_init(
    base_dir: *const c_char,
    max_size: c_int,
    cap: c_double,
) -> c_int {
    let base_dir = match to_str(base_dir) {
        Some(s) => s.to_string(),
        None => return ERROR_INVALID_ARG,
    };
    if max_size <= 0 {
        return ERROR_INVALID_ARG;
    }

    guarded(|| match MANAGER.init(base_dir, max_size as u64, cap) {
        Ok(()) => SUCCESS,
        Err(err) => status_code(&err),
    })
}

/// Look up a cache entry.
///
/// On success, returns a `malloc`ed buffer of `*result_len` bytes owned
/// by the caller. On failure, returns null and stores a negative status
/// code in `*result_len`.
///
/// # Safety
///
/// String arguments must be null or valid NUL-terminated strings;
/// `result_len` must be null or point to writable memory.
#[no_mangle]
pub unsafe extern "C" fn shardcache_get(
    table: *const c_char,
    tenant: *const c_char,
    freshness: *const c_char,
    bind: *const c_char,
    result_len: *mut c_int,
) -> *mut c_char {
    if result_len.is_null() {
        return std::ptr::null_mut();
    }

    let args = (to_str(table), to_str(tenant), to_str(freshness), to_str(bind));
    let (table, tenant, freshness, bind) = match args {
        (Some(table), Some(tenant), Some(freshness), Some(bind)) => {
            (table, tenant, freshness, bind)
        }
        _ => {
            *result_len = ERROR_INVALID_ARG;
            return std::ptr::null_mut();
        }
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        MANAGER.get(table, tenant, freshness, bind)
    }));

    match outcome {
        Ok(Ok(content)) => {
            if content.len() > c_int::MAX as usize {
                *result_len = ERROR_GENERAL;
                return std::ptr::null_mut();
            }
            // malloc so the caller can free from any language runtime.
            let buffer = libc::malloc(content.len().max(1)) as *mut c_char;
            if buffer.is_null() {
                *result_len = ERROR_GENERAL;
                return std::ptr::null_mut();
            }
            std::ptr::copy_nonoverlapping(content.as_ptr(), buffer as *mut u8, content.len());
            *result_len = content.len() as c_int;
            buffer
        }
        Ok(Err(err)) => {
            *result_len = status_code(&err);
            std::ptr::null_mut()
        }
        Err(_) => {
            *result_len = ERROR_GENERAL;
            std::ptr::null_mut()
        }
    }
}

/// Store a cache entry.
///
/// # Safety
///
/// String arguments must be null or valid NUL-terminated strings;
/// `content` must be null or point to `content_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn shardcache_set(
    table: *const c_char,
    tenant: *const c_char,
    freshness: *const c_char,
    bind: *const c_char,
    content: *const c_char,
    content_len: c_int,
) -> c_int {
    let args = (to_str(table), to_str(tenant), to_str(freshness), to_str(bind));
    let (table, tenant, freshness, bind) = match args {
        (Some(table), Some(tenant), Some(freshness), Some(bind)) => {
            (table, tenant, freshness, bind)
        }
        _ => return ERROR_INVALID_ARG,
    };
    if content.is_null() || content_len < 0 {
        return ERROR_INVALID_ARG;
    }
    let content = std::slice::from_raw_parts(content as *const u8, content_len as usize);

    guarded(|| match MANAGER.set(table, tenant, freshness, bind, content) {
        Ok(()) => SUCCESS,
        Err(err) => status_code(&err),
    })
}

/// Drop every cached tenant of a table.
///
/// # Safety
///
/// `table` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn shardcache_delete(table: *const c_char) -> c_int {
    let table = match to_str(table) {
        Some(s) => s,
        None => return ERROR_INVALID_ARG,
    };

    guarded(|| match MANAGER.delete(table) {
        Ok(()) => SUCCESS,
        Err(err) => status_code(&err),
    })
}

/// Close the cache, releasing all handles.
#[no_mangle]
pub extern "C" fn shardcache_close() -> c_int {
    guarded(|| match MANAGER.close() {
        Ok(()) => SUCCESS,
        Err(err) => status_code(&err),
    })
}

/// Release a buffer returned by `shardcache_get`.
///
/// # Safety
///
/// `ptr` must be null or a buffer previously returned by
/// `shardcache_get` that has not already been freed.
#[no_mangle]
pub unsafe extern "C" fn shardcache_free_mem(ptr: *mut c_char) {
    if !ptr.is_null() {
        libc::free(ptr as *mut libc::c_void);
    }
}
