use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::adapters::digest_file_async;
use crate::app::pool::WorkerPool;
use crate::domain::{
    DomainError, Job, JobFailure, JobId, JobUpdate, PoolStatus, TimedText,
};
use crate::ports::{Clock, ResultStore};

/// Ledger writes are attempted this many times before giving up.
const LEDGER_ATTEMPTS: u32 = 2;

/// End-to-end request lifecycle: digest, cache lookup, pool dispatch,
/// normalization, caching and ledger bookkeeping.
pub struct JobOrchestrator {
    store: Arc<dyn ResultStore>,
    pool: Arc<WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn ResultStore>, pool: Arc<WorkerPool>, clock: Arc<dyn Clock>) -> Self {
        Self { store, pool, clock }
    }

    /// Transcribe the file at `path`, reusing a cached result when the same
    /// bytes have been transcribed before.
    ///
    /// Every call creates one job in the ledger. Failures carry that job's id.
    pub async fn transcribe(
        &self,
        path: &Path,
        filename: &str,
        file_size: u64,
    ) -> Result<TimedText, JobFailure> {
        let job = Job::new(filename, file_size, self.clock.now());
        let span = info_span!("job", job_id = %job.id, filename = %filename);

        self.run_job(job, path).instrument(span).await
    }

    async fn run_job(&self, job: Job, path: &Path) -> Result<TimedText, JobFailure> {
        let started = Instant::now();
        let mut guard = CancelGuard {
            store: self.store.clone(),
            clock: self.clock.clone(),
            job_id: Some(job.id.clone()),
            started,
        };

        let outcome = self.execute(job, path, started).await;
        guard.disarm();
        outcome
    }

    async fn execute(
        &self,
        mut job: Job,
        path: &Path,
        started: Instant,
    ) -> Result<TimedText, JobFailure> {
        info!(file_size = job.file_size, "Job received");

        let digest = match digest_file_async(path.to_path_buf()).await {
            Ok(digest) => digest,
            Err(e) => {
                self.record_created(&job).await;
                return Err(self.fail(&job.id, started, e).await);
            }
        };
        job.content_digest = Some(digest.clone());
        self.record_created(&job).await;

        match self.store.lookup(&digest).await {
            Ok(Some(mut cached)) => {
                let elapsed = started.elapsed().as_secs_f64();
                cached.processing_time = elapsed;
                self.advance(
                    &job.id,
                    JobUpdate::completed(self.clock.now(), elapsed, cached.clone()),
                )
                .await;
                info!(digest = %digest.short(), elapsed, "Served from cache");
                return Ok(cached);
            }
            Ok(None) => debug!(digest = %digest.short(), "Cache miss"),
            Err(e) => warn!(error = %e, digest = %digest.short(), "Cache lookup failed, treating as miss"),
        }

        self.advance(&job.id, JobUpdate::processing()).await;

        let raw = match self.pool.submit(path).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(&job.id, started, e).await),
        };

        let result = TimedText::from_raw(raw);

        if let Err(e) = self.store.save(&digest, &result, job.file_size).await {
            warn!(error = %e, digest = %digest.short(), "Failed to cache result");
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.advance(
            &job.id,
            JobUpdate::completed(self.clock.now(), elapsed, result.clone()),
        )
        .await;

        info!(
            elapsed,
            words = result.words.len(),
            duration = result.duration,
            "Job completed"
        );
        Ok(result)
    }

    async fn fail(&self, id: &JobId, started: Instant, error: DomainError) -> JobFailure {
        let elapsed = started.elapsed().as_secs_f64();
        error!(error = %error, kind = error.kind(), elapsed, "Job failed");

        self.advance(id, JobUpdate::failed(self.clock.now(), elapsed, error.to_string()))
            .await;
        JobFailure::new(id.clone(), error)
    }

    async fn record_created(&self, job: &Job) {
        for attempt in 1..=LEDGER_ATTEMPTS {
            match self.store.record_job_created(job).await {
                Ok(()) => return,
                Err(e) if attempt < LEDGER_ATTEMPTS => {
                    warn!(error = %e, attempt, "Failed to record job, retrying")
                }
                Err(e) => error!(error = %e, "Failed to record job"),
            }
        }
    }

    async fn advance(&self, id: &JobId, update: JobUpdate) {
        for attempt in 1..=LEDGER_ATTEMPTS {
            match self.store.update_job_status(id, &update).await {
                Ok(true) => return,
                Ok(false) => {
                    warn!(status = %update.status, "Job transition not applied");
                    return;
                }
                Err(e) if attempt < LEDGER_ATTEMPTS => {
                    warn!(error = %e, attempt, status = %update.status, "Failed to update job, retrying")
                }
                Err(e) => error!(error = %e, status = %update.status, "Failed to update job"),
            }
        }
    }

    /// Pool occupancy snapshot.
    pub fn health(&self) -> PoolStatus {
        self.pool.status()
    }
}

/// Marks the job failed if `transcribe` is dropped before it finishes.
struct CancelGuard {
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    job_id: Option<JobId>,
    started: Instant,
}

impl CancelGuard {
    fn disarm(&mut self) {
        self.job_id = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let Some(id) = self.job_id.take() else {
            return;
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(job_id = %id, "Job cancelled outside a runtime, ledger not updated");
            return;
        };

        let update = JobUpdate::failed(
            self.clock.now(),
            self.started.elapsed().as_secs_f64(),
            "Cancelled before completion",
        );
        let store = self.store.clone();
        handle.spawn(async move {
            match store.update_job_status(&id, &update).await {
                Ok(_) => info!(job_id = %id, "Cancelled job marked failed"),
                Err(e) => warn!(error = %e, job_id = %id, "Failed to mark cancelled job"),
            }
        });
    }
}
