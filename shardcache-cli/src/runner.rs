//! Request loop wiring the line protocol to a cache manager.
//!
//! Reads one request per line, writes one response line. Generic over the
//! input and output streams so tests can drive it with in-memory buffers.

use crate::protocol::{parse_line, Request};
use shardcache::error::CacheError;
use shardcache::manager::CacheManager;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Run the request loop until `CLOSE`, end of input, or a stream error.
///
/// Responses:
/// - `OK: <result>` on success
/// - `MISS: <reason>` for a cache miss (not a failure)
/// - `ERROR: <reason>` for everything else
///
/// # Errors
///
/// Returns the underlying `io::Error` when the input stream fails or a
/// response cannot be written; protocol-level failures are reported in
/// band and do not end the loop.
pub fn run<R: BufRead, W: Write>(
    manager: &CacheManager,
    input: R,
    mut output: W,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match parse_line(line) {
            Ok(request) => request,
            Err(err) => {
                writeln!(output, "ERROR: {}", err)?;
                output.flush()?;
                continue;
            }
        };

        debug!(?request, "request received");

        let terminate = matches!(request, Request::Close);
        let response = dispatch(manager, request);
        writeln!(output, "{}", response)?;
        output.flush()?;

        if terminate {
            break;
        }
    }
    Ok(())
}

/// Execute one request and render its response line.
fn dispatch(manager: &CacheManager, request: Request) -> String {
    match request {
        Request::Init {
            base_dir,
            max_size,
            cap,
        } => match manager.init(base_dir, max_size, cap) {
            Ok(()) => "OK: initialized".to_string(),
            Err(err) => format!("ERROR: {}", err),
        },
        Request::Set {
            table,
            tenant,
            freshness,
            bind,
            content,
        } => match manager.set(&table, &tenant, &freshness, &bind, content.as_bytes()) {
            Ok(()) => "OK: set".to_string(),
            Err(err) => format!("ERROR: {}", err),
        },
        Request::Get {
            table,
            tenant,
            freshness,
            bind,
        } => match manager.get(&table, &tenant, &freshness, &bind) {
            Ok(content) => format!("OK: {}", String::from_utf8_lossy(&content)),
            Err(CacheError::Miss(reason)) => format!("MISS: {}", reason),
            Err(err) => format!("ERROR: {}", err),
        },
        Request::Delete { table } => match manager.delete(&table) {
            Ok(()) => "OK: deleted".to_string(),
            Err(err) => format!("ERROR: {}", err),
        },
        Request::Close => match manager.close() {
            Ok(()) => "OK: closed".to_string(),
            Err(err) => format!("ERROR: {}", err),
        },
    }
}
