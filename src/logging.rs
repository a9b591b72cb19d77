//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, when a log file can be
//! opened, to a non-blocking file writer as well. `DOCSTASH_LOG_FILE` picks
//! the file path; without it the pipeline appends to `logs/docstash.log`.
//! Filtering follows `RUST_LOG` and defaults to `info`.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Keeps the non-blocking writer's flush thread alive for the process
// lifetime.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the tracing subscriber for stdout and optional file logging.
///
/// Safe to call more than once: later calls leave the installed subscriber
/// in place. Returns whether this call installed it.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let file_layer = file_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}

fn log_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DOCSTASH_LOG_FILE") {
        return Some(PathBuf::from(path));
    }
    if let Err(err) = std::fs::create_dir_all("logs") {
        eprintln!("Failed to create logs directory: {err}");
        return None;
    }
    Some(PathBuf::from("logs/docstash.log"))
}

/// Open the log file for appending and wrap it in a non-blocking writer.
/// Returns `None` when the file cannot be opened; stdout logging still works.
fn file_writer() -> Option<NonBlocking> {
    let path = log_file_path()?;
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
