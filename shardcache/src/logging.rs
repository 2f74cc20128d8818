//! Logging bootstrap for ShardCache front-ends.
//!
//! Diagnostics go to stderr; stdout belongs to the line protocol. A
//! plain-text session log file can be layered on top. Filtering follows
//! the RUST_LOG environment variable, defaulting to `info`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Open the session log file, truncating whatever a previous session
/// left behind and creating parent directories as needed.
fn open_session_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

/// Install the global tracing subscriber.
///
/// Always logs to stderr; `log_file` adds a session file on top. The
/// subscriber can only be installed once per process, so repeated calls
/// leave the first configuration in place.
///
/// # Errors
///
/// Returns an error if the session log file cannot be created.
pub fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();

    let file_layer = match log_file {
        Some(path) => {
            let file = open_session_log(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .compact(),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}
