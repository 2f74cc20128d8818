//! ShardCache CLI - interactive line-protocol front-end
//!
//! Reads one request per line on stdin and writes one response line on
//! stdout:
//!
//! ```text
//! INIT base_dir max_size cap
//! SET table tenant freshness bind content...
//! GET table tenant freshness bind
//! DELETE table
//! CLOSE
//! ```
//!
//! Responses are `OK: <result>`, `MISS: <reason>`, or `ERROR: <reason>`.
//! `CLOSE` terminates the stream. Logging goes to stderr (plus an
//! optional session file) so stdout stays a clean response channel.

mod error;
mod protocol;
mod runner;

use clap::Parser;
use error::CliError;
use shardcache::logging::init_logging;
use shardcache::manager::CacheManager;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "shardcache")]
#[command(version = shardcache::VERSION)]
#[command(about = "Tenant-partitioned SQLite cache", long_about = None)]
struct Cli {
    /// Write a session log file in addition to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable logging entirely
    #[arg(long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if !cli.quiet {
        init_logging(cli.log_file.as_deref())
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    }

    info!("shardcache v{}", shardcache::VERSION);

    // The manager lives exactly as long as the request loop.
    let manager = CacheManager::new();

    let stdin = io::stdin();
    let stdout = io::stdout();
    runner::run(&manager, stdin.lock(), stdout.lock())?;

    info!("input stream ended, shutting down");
    Ok(())
}
