use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures_util::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::AppController;
use crate::domain::{PoolStatus, StoreStats, TimedText};

/// Outcome of one file in a `transcribe` batch.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Completed {
        file: PathBuf,
        result: TimedText,
    },
    Failed {
        file: PathBuf,
        job_id: String,
        kind: String,
        error: String,
    },
}

/// Ledger statistics plus live pool occupancy.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub stats: StoreStats,
    pub pool: PoolStatus,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}

async fn transcribe_one(controller: &AppController, file: &Path) -> FileOutcome {
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    // An unreadable file still gets a job; digesting reports the failure.
    let file_size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0);

    match controller
        .orchestrator()
        .transcribe(file, &filename, file_size)
        .await
    {
        Ok(result) => FileOutcome::Completed {
            file: file.to_path_buf(),
            result,
        },
        Err(failure) => FileOutcome::Failed {
            file: file.to_path_buf(),
            job_id: failure.job_id.to_string(),
            kind: failure.kind().to_string(),
            error: failure.source.to_string(),
        },
    }
}

/// Transcribe all `files` concurrently and print one outcome per file.
///
/// The retention sweeper runs alongside the batch.
pub async fn transcribe(controller: &AppController, files: &[PathBuf]) -> Result<()> {
    let cancel = CancellationToken::new();
    let sweeper = controller.start_sweeper(cancel.clone());

    let outcomes = join_all(files.iter().map(|file| transcribe_one(controller, file))).await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Retention sweeper task ended abnormally");
    }

    print_json(&outcomes)?;

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, FileOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        bail!("{} of {} files failed", failed, outcomes.len());
    }
    Ok(())
}

/// Run one retention pass and print the purge counts.
pub async fn sweep(controller: &AppController) -> Result<()> {
    let report = controller
        .sweeper()
        .sweep()
        .await
        .context("Retention sweep failed")?;
    print_json(&report)
}

/// Print statistics for jobs created in the last `days` days.
pub async fn stats(controller: &AppController, days: u32) -> Result<()> {
    let stats = controller
        .stats(chrono::Duration::days(i64::from(days)))
        .await
        .context("Failed to query statistics")?;

    print_json(&StatsReport {
        stats,
        pool: controller.health(),
    })
}

/// Print config, data, log and database locations.
pub fn paths(controller: &AppController) -> Result<()> {
    print_json(&controller.paths())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TomlConfigStore;
    use crate::domain::AppConfig;
    use crate::ports::ConfigStore;

    async fn controller_in(dir: &Path) -> AppController {
        let store = TomlConfigStore::with_data_dir(dir).unwrap();
        let mut config = AppConfig::new();
        config.logging.file_logging = false;
        store.save(&config).unwrap();
        AppController::new(Some(dir.to_path_buf())).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_reports_typed_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = controller_in(temp_dir.path()).await;

        let outcome = transcribe_one(&controller, &temp_dir.path().join("nope.mp3")).await;
        match &outcome {
            FileOutcome::Failed { kind, job_id, .. } => {
                assert_eq!(kind, "io");
                assert!(!job_id.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "io");

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_with_failures_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = controller_in(temp_dir.path()).await;

        let files = vec![temp_dir.path().join("a.wav"), temp_dir.path().join("b.wav")];
        let err = transcribe(&controller, &files).await.unwrap_err();
        assert!(err.to_string().contains("2 of 2"));

        let stats = controller.stats(chrono::Duration::days(1)).await.unwrap();
        assert_eq!(stats.jobs.failed_jobs, 2);

        controller.shutdown().await;
    }
}
