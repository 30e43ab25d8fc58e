//! Logging setup for trailhead-session.
//!
//! Console logs go to stderr because stdout carries protocol lines. With
//! `--log-file`, logs go to that file through a non-blocking writer whose
//! guard must outlive `main`.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "TRAILHEAD_DEBUG_LOG";

pub fn init(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let Some(path) = log_file else {
        init_stderr();
        return None;
    };

    match file_appender(path) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(err) => {
            init_stderr();
            tracing::warn!(
                error = %err,
                path = %path.display(),
                "Failed to open log file; logging to stderr"
            );
            None
        }
    }
}

fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| "log file path has no file name".to_string())?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|err| err.to_string())
}

fn env_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
