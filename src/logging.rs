//! Logging setup for quality controller hosts.
//!
//! Configures tracing with JSON output to stderr and to a daily-rotated
//! file, by default under ~/.local/share/adaptive-quality/.

use crate::error::LoggingError;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Default log directory relative to the user's home
const LOG_DIR: &str = ".local/share/adaptive-quality";
/// Log file name prefix, rotated files become `quality.<date>.log`
const LOG_FILE_PREFIX: &str = "quality";
/// Maximum number of log files to retain
const MAX_LOG_FILES: usize = 3;

/// Initialize the global subscriber with both stderr and file output.
///
/// `log_dir` overrides the default directory. Verbosity follows `RUST_LOG`
/// and defaults to `info`.
pub fn init_logging(log_dir: Option<&Path>) -> Result<LogGuard, LoggingError> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_directory()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: log_dir.display().to_string(),
        source: e,
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file);

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

/// Default log directory, resolved from HOME (or USERPROFILE).
pub fn default_log_directory() -> Result<PathBuf, LoggingError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| LoggingError::HomeDirectoryNotFound)?;

    Ok(PathBuf::from(home).join(LOG_DIR))
}

/// Keeps the non-blocking writers flushing.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
    _stderr_guard: tracing_appender::non_blocking::WorkerGuard,
}
