use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::config::RetentionConfig;
use crate::domain::DomainError;
use crate::ports::{Clock, ResultStore};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cache_purged: u64,
    pub jobs_purged: u64,
}

/// Evicts cache entries not accessed within `cache_ttl` and jobs created
/// more than `job_ttl` ago.
pub struct RetentionSweeper {
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    job_ttl: Duration,
}

/// `now - ttl`, or a config error when the window reaches past the representable range.
fn cutoff(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, DomainError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_sub_signed(ttl))
        .ok_or_else(|| {
            DomainError::Config(format!("Retention window out of range: {}s", ttl.as_secs()))
        })
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn ResultStore>, clock: Arc<dyn Clock>, config: &RetentionConfig) -> Self {
        Self {
            store,
            clock,
            cache_ttl: config.cache_ttl(),
            job_ttl: config.job_ttl(),
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let now = self.clock.now();
        let cache_cutoff = cutoff(now, self.cache_ttl)?;
        let job_cutoff = cutoff(now, self.job_ttl)?;

        let cache_purged = self.store.purge_cache_older_than(cache_cutoff).await?;
        let jobs_purged = self.store.purge_jobs_older_than(job_cutoff).await?;

        let report = SweepReport {
            cache_purged,
            jobs_purged,
        };
        if cache_purged > 0 || jobs_purged > 0 {
            info!(cache_purged, jobs_purged, "Retention sweep removed stale records");
        } else {
            debug!("Retention sweep found nothing to remove");
        }
        Ok(report)
    }

    /// Sweep every `interval` until `cancel` fires. The first sweep runs one
    /// interval after start.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs_f64(), "Retention sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Retention sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(interval, cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteResultStore;
    use crate::domain::config::StoreConfig;
    use crate::domain::{ContentDigest, Job};
    use crate::testing::{sample_timed_text, ManualClock};
    use chrono::Duration as ChronoDuration;

    async fn fixture() -> (tempfile::TempDir, Arc<ManualClock>, Arc<SqliteResultStore>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = SqliteResultStore::open(&dir.path().join("jobs.db"), &StoreConfig::default())
            .await
            .unwrap()
            .with_clock(clock.clone());
        (dir, clock, Arc::new(store))
    }

    fn retention(cache_hours: u64, job_hours: u64) -> RetentionConfig {
        RetentionConfig {
            cache_ttl_hours: cache_hours,
            job_ttl_hours: job_hours,
            ..RetentionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_rows() {
        let (_dir, clock, store) = fixture().await;

        let stale = ContentDigest::from_hex("stale");
        let old_job = Job::new("old.wav", 1, clock.now());
        store.save(&stale, &sample_timed_text("stale"), 1).await.unwrap();
        store.record_job_created(&old_job).await.unwrap();

        clock.advance(ChronoDuration::hours(30));

        let fresh = ContentDigest::from_hex("fresh");
        let new_job = Job::new("new.wav", 1, clock.now());
        store.save(&fresh, &sample_timed_text("fresh"), 1).await.unwrap();
        store.record_job_created(&new_job).await.unwrap();

        clock.advance(ChronoDuration::hours(1));

        let sweeper = RetentionSweeper::new(store.clone(), clock.clone(), &retention(24, 24));
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                cache_purged: 1,
                jobs_purged: 1
            }
        );

        assert!(store.cache_entry(&stale).await.unwrap().is_none());
        assert!(store.cache_entry(&fresh).await.unwrap().is_some());
        assert!(store.get_job(&old_job.id).await.unwrap().is_none());
        assert!(store.get_job(&new_job.id).await.unwrap().is_some());

        assert_eq!(sweeper.sweep().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_cache_hit_keeps_entry_alive() {
        let (_dir, clock, store) = fixture().await;
        let digest = ContentDigest::from_hex("popular");
        store.save(&digest, &sample_timed_text("popular"), 1).await.unwrap();

        clock.advance(ChronoDuration::hours(20));
        store.lookup(&digest).await.unwrap();
        clock.advance(ChronoDuration::hours(20));

        let sweeper = RetentionSweeper::new(store.clone(), clock, &retention(24, 24));
        assert_eq!(sweeper.sweep().await.unwrap().cache_purged, 0);
        assert!(store.cache_entry(&digest).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_window_is_an_error() {
        let (_dir, clock, store) = fixture().await;

        // One million years reaches before the earliest representable date.
        let ancient = retention(1_000_000 * 365 * 24, 24);
        let sweeper = RetentionSweeper::new(store.clone(), clock.clone(), &ancient);
        assert!(matches!(sweeper.sweep().await, Err(DomainError::Config(_))));

        let sweeper = RetentionSweeper::new(store, clock, &retention(24, u64::MAX));
        assert!(matches!(sweeper.sweep().await, Err(DomainError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_sweeps_until_cancelled() {
        let (_dir, clock, store) = fixture().await;
        let digest = ContentDigest::from_hex("old");
        store.save(&digest, &sample_timed_text("old"), 1).await.unwrap();
        clock.advance(ChronoDuration::days(8));

        let sweeper = Arc::new(RetentionSweeper::new(
            store.clone(),
            clock,
            &RetentionConfig::default(),
        ));
        let cancel = CancellationToken::new();
        let handle = sweeper.spawn(Duration::from_millis(20), cancel.clone());

        for _ in 0..100 {
            if store.cache_entry(&digest).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.cache_entry(&digest).await.unwrap().is_none());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
