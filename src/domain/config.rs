use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrent external transcriptions.
    /// Keep small: each run is CPU and memory heavy.
    pub capacity: usize,
    /// Uses after which a worker is retired and replaced.
    pub max_uses_per_worker: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            max_uses_per_worker: 10,
        }
    }
}

/// External transcriber process configuration.
///
/// The process is invoked as `<program> <args...> <file> <model>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Model size handed to the transcriber (tiny, base, small, medium, large).
    pub model: String,
    /// Hard wall-clock limit per run.
    pub timeout_secs: u64,
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            program: "./venv/bin/python".to_string(),
            args: vec!["whisper_transcribe.py".to_string()],
            model: "base".to_string(),
            timeout_secs: 600,
            env: BTreeMap::new(),
        }
    }
}

impl TranscriberConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Result store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file. Relative to the data directory when not absolute.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("transcription_jobs.db"),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Upper bound for retention windows (100 years).
pub const MAX_RETENTION_HOURS: u64 = 100 * 365 * 24;

/// Retention windows for the sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Cache entries not accessed for this long are evicted (default one week).
    pub cache_ttl_hours: u64,
    /// Job records older than this are deleted (default 30 days).
    pub job_ttl_hours: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: 7 * 24,
            job_ttl_hours: 30 * 24,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl RetentionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_hours.saturating_mul(3600))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub transcriber: TranscriberConfig,
    pub store: StoreConfig,
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.pool.capacity == 0 {
            return Err(DomainError::Config("pool.capacity must be at least 1".to_string()));
        }
        if self.pool.max_uses_per_worker == 0 {
            return Err(DomainError::Config(
                "pool.max_uses_per_worker must be at least 1".to_string(),
            ));
        }
        if self.transcriber.timeout_secs == 0 {
            return Err(DomainError::Config(
                "transcriber.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.transcriber.program.trim().is_empty() {
            return Err(DomainError::Config("transcriber.program is empty".to_string()));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(DomainError::Config(
                "retention.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        for (name, hours) in [
            ("cache_ttl_hours", self.retention.cache_ttl_hours),
            ("job_ttl_hours", self.retention.job_ttl_hours),
        ] {
            if hours > MAX_RETENTION_HOURS {
                return Err(DomainError::Config(format!(
                    "retention.{} must be at most {}",
                    name, MAX_RETENTION_HOURS
                )));
            }
        }
        Ok(())
    }
}
