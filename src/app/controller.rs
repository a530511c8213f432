use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{ProcessTranscriber, SqliteResultStore, TomlConfigStore};
use crate::app::orchestrator::JobOrchestrator;
use crate::app::pool::WorkerPool;
use crate::app::sweeper::RetentionSweeper;
use crate::domain::{AppConfig, DomainError, PoolStatus, StoreStats};
use crate::infrastructure::init_logging;
use crate::ports::{Clock, ConfigStore, ResultStore, SystemClock};

/// Application paths information.
#[derive(Debug, Clone, Serialize)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
}

/// Application controller that wires configuration, logging, the result
/// store, the worker pool and the retention sweeper together.
pub struct AppController {
    config: AppConfig,
    config_store: Arc<TomlConfigStore>,
    store: Arc<SqliteResultStore>,
    orchestrator: JobOrchestrator,
    sweeper: Arc<RetentionSweeper>,
    clock: Arc<dyn Clock>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    ///
    /// `data_dir` overrides the OS-specific location of the config file,
    /// database and logs.
    pub async fn new(data_dir: Option<PathBuf>) -> Result<Self, DomainError> {
        let config_store = Arc::new(match data_dir {
            Some(dir) => TomlConfigStore::with_data_dir(dir)?,
            None => TomlConfigStore::new()?,
        });

        let config = config_store.load()?;
        config.validate()?;

        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!(version = env!("CARGO_PKG_VERSION"), "scribed starting up");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let database_path = config_store.resolve_data_path(&config.store.database_path);
        let store = Arc::new(
            SqliteResultStore::open(&database_path, &config.store)
                .await?
                .with_clock(clock.clone()),
        );

        let transcriber = Arc::new(ProcessTranscriber::new(&config.transcriber));
        let pool = Arc::new(WorkerPool::new(&config.pool, transcriber));
        let orchestrator = JobOrchestrator::new(store.clone(), pool, clock.clone());
        let sweeper = Arc::new(RetentionSweeper::new(
            store.clone(),
            clock.clone(),
            &config.retention,
        ));

        info!(
            capacity = config.pool.capacity,
            model = %config.transcriber.model,
            database = ?database_path,
            "AppController initialized"
        );

        Ok(Self {
            config,
            config_store,
            store,
            orchestrator,
            sweeper,
            clock,
            _log_guard: log_guard,
        })
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    /// Run the retention sweeper on its configured interval until `cancel` fires.
    pub fn start_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.sweeper
            .clone()
            .spawn(self.config.retention.sweep_interval(), cancel)
    }

    /// Ledger and cache statistics for jobs created within the last `window`.
    pub async fn stats(&self, window: chrono::Duration) -> Result<StoreStats, DomainError> {
        self.store.stats(self.clock.now() - window).await
    }

    pub fn health(&self) -> PoolStatus {
        self.orchestrator.health()
    }

    pub fn paths(&self) -> AppPaths {
        AppPaths {
            data_dir: self.config_store.data_dir(),
            logs_dir: self.config_store.logs_dir(),
            config_path: self.config_store.config_path(),
            database_path: self
                .config_store
                .resolve_data_path(&self.config.store.database_path),
        }
    }

    /// Close database connections.
    pub async fn shutdown(&self) {
        self.store.close().await;
        info!("scribed shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn controller_in(dir: &std::path::Path) -> AppController {
        let store = TomlConfigStore::with_data_dir(dir).unwrap();
        let mut config = AppConfig::new();
        config.logging.file_logging = false;
        store.save(&config).unwrap();

        AppController::new(Some(dir.to_path_buf())).await.unwrap()
    }

    #[tokio::test]
    async fn test_paths_live_under_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = controller_in(temp_dir.path()).await;

        let paths = controller.paths();
        assert_eq!(paths.data_dir, temp_dir.path());
        assert_eq!(paths.database_path, temp_dir.path().join("transcription_jobs.db"));
        assert!(paths.database_path.exists());

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_fresh_controller_reports_empty_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = controller_in(temp_dir.path()).await;

        let stats = controller.stats(chrono::Duration::days(7)).await.unwrap();
        assert_eq!(stats.jobs.total_jobs, 0);
        assert_eq!(stats.cache.cache_entries, 0);

        let health = controller.health();
        assert_eq!(health.capacity, 2);
        assert_eq!(health.size, 0);

        let report = controller.sweeper().sweep().await.unwrap();
        assert_eq!(report.cache_purged + report.jobs_purged, 0);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path()).unwrap();
        let mut config = AppConfig::new();
        config.pool.capacity = 0;
        store.save(&config).unwrap();

        let result = AppController::new(Some(temp_dir.path().to_path_buf())).await;
        assert!(matches!(result, Err(DomainError::Config(_))));
    }
}
