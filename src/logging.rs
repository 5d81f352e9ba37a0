//! Tracing setup for the server process.
//!
//! Two sinks are installed: a compact stdout layer filtered through `RUST_LOG`
//! (defaulting to `info`), and a best-effort append-only file sink. The file path
//! comes from `STUDYMATE_LOG_FILE` when set, falling back to `logs/studymate.log`.
//! File writes run on a non-blocking worker so a slow disk never stalls the
//! ingestion or streaming paths.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the non-blocking writer's worker alive for the process lifetime.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// A log file that cannot be opened degrades to stdout-only logging instead of
/// aborting startup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry().with(filter).with(stdout);

    match open_log_sink() {
        Some(writer) => {
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file).init();
        }
        None => registry.init(),
    }
}

/// Resolve the log file location and wrap it in a non-blocking appender.
fn open_log_sink() -> Option<NonBlocking> {
    let target =
        std::env::var("STUDYMATE_LOG_FILE").unwrap_or_else(|_| "logs/studymate.log".to_string());
    let path = Path::new(&target);

    let Some(file_name) = path.file_name() else {
        eprintln!("STUDYMATE_LOG_FILE does not name a file: {target}");
        return None;
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Cannot create log directory {}: {err}", directory.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
