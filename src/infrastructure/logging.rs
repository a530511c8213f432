use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::config::LoggingConfig;
use crate::domain::DomainError;

fn default_filter(level: &str) -> String {
    format!("scribed={},warn", level)
}

/// Initialize the logging system with console output and file rotation.
///
/// Console output goes to stderr so stdout stays free for command results.
/// Returns a guard that must be kept alive for the duration of the process;
/// when it is dropped any buffered file output is flushed.
pub fn init_logging(
    logs_dir: &Path,
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, DomainError> {
    let level = config.level.as_str();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_span_events(FmtSpan::NONE)
        .with_filter(env_filter);

    if !config.file_logging {
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .try_init();

        tracing::debug!(level = level, "Logging initialized (console only)");
        return Ok(None);
    }

    fs::create_dir_all(logs_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("scribed")
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1) as usize)
        .build(logs_dir)
        .map_err(|e| DomainError::Config(format!("Failed to create log file appender: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(EnvFilter::new(format!("scribed={}", level)));

    // try_init: a second initialization in the same process is not an error.
    if tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!(
            logs_dir = ?logs_dir,
            level = level,
            "Logging initialized with file output"
        );
    }

    Ok(Some(guard))
}
