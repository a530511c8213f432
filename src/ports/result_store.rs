use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CacheEntry, ContentDigest, DomainError, Job, JobId, JobUpdate, StoreStats, TimedText,
};

/// Port for the persistent result cache and job ledger.
///
/// All operations must be safe to call concurrently from many in-flight jobs.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fetch a cached result.
    ///
    /// The read must not wait on unrelated writers. On a hit the entry's
    /// access count and last-accessed time are bumped; a failed bump is
    /// logged and the hit is still returned.
    async fn lookup(&self, digest: &ContentDigest) -> Result<Option<TimedText>, DomainError>;

    /// Insert or replace the cached result for `digest`.
    async fn save(
        &self,
        digest: &ContentDigest,
        result: &TimedText,
        file_size: u64,
    ) -> Result<(), DomainError>;

    /// Read a cache entry without touching its access metadata.
    async fn cache_entry(&self, digest: &ContentDigest) -> Result<Option<CacheEntry>, DomainError>;

    /// Append a new job to the ledger.
    async fn record_job_created(&self, job: &Job) -> Result<(), DomainError>;

    /// Move a job forward.
    ///
    /// Returns false when the job does not exist or the transition is not
    /// allowed from its current status.
    async fn update_job_status(&self, id: &JobId, update: &JobUpdate) -> Result<bool, DomainError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, DomainError>;

    /// Delete cache entries last accessed before `cutoff`. Returns the count removed.
    async fn purge_cache_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Delete jobs created before `cutoff`. Returns the count removed.
    async fn purge_jobs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Ledger statistics for jobs created since `since`, plus cache totals.
    async fn stats(&self, since: DateTime<Utc>) -> Result<StoreStats, DomainError>;
}
