use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::domain::config::StoreConfig;
use crate::domain::{
    CacheEntry, CacheStats, ContentDigest, DomainError, Job, JobId, JobStats, JobStatus,
    JobUpdate, StoreStats, TimedText,
};
use crate::ports::{Clock, ResultStore, SystemClock};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        file_hash TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL,
        started_at INTEGER,
        completed_at INTEGER,
        result TEXT,
        error TEXT,
        file_size INTEGER NOT NULL,
        processing_time REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_cache (
        file_hash TEXT PRIMARY KEY,
        result TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        access_count INTEGER NOT NULL DEFAULT 1,
        last_accessed INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_cache_accessed ON job_cache(last_accessed)",
];

/// SQLite-backed result cache and job ledger.
///
/// Runs in WAL mode so cache reads are not blocked by concurrent writes.
/// Timestamps are stored as Unix milliseconds.
pub struct SqliteResultStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteResultStore {
    /// Open (creating if needed) the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path, config: &StoreConfig) -> Result<Self, DomainError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.init_schema().await?;

        info!(path = ?path, "Result store opened");
        Ok(store)
    }

    /// Replace the clock used for access and purge bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn init_schema(&self) -> Result<(), DomainError> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn encode_result(result: &TimedText) -> Result<String, DomainError> {
    Ok(serde_json::to_string(result)?)
}

fn decode_result(json: &str) -> Result<TimedText, DomainError> {
    Ok(serde_json::from_str(json)?)
}

fn job_from_row(row: &SqliteRow) -> Result<Job, DomainError> {
    let status: String = row.try_get("status")?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| DomainError::Store(format!("Unknown job status '{}'", status)))?;

    let result: Option<String> = row.try_get("result")?;
    let result = result.as_deref().map(decode_result).transpose()?;

    Ok(Job {
        id: JobId::from(row.try_get::<String, _>("id")?),
        filename: row.try_get("filename")?,
        content_digest: row
            .try_get::<Option<String>, _>("file_hash")?
            .map(ContentDigest::from_hex),
        status,
        created_at: from_millis(row.try_get("created_at")?),
        started_at: row.try_get::<Option<i64>, _>("started_at")?.map(from_millis),
        completed_at: row.try_get::<Option<i64>, _>("completed_at")?.map(from_millis),
        file_size: row.try_get::<i64, _>("file_size")?.max(0) as u64,
        processing_time: row.try_get("processing_time")?,
        result,
        error: row.try_get("error")?,
    })
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn lookup(&self, digest: &ContentDigest) -> Result<Option<TimedText>, DomainError> {
        // Plain read: under WAL it never waits on writers.
        let row = sqlx::query("SELECT result FROM job_cache WHERE file_hash = ?")
            .bind(digest.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.try_get("result")?;
        let result = decode_result(&json)?;

        let bumped = sqlx::query(
            "UPDATE job_cache SET access_count = access_count + 1, last_accessed = ? \
             WHERE file_hash = ?",
        )
        .bind(to_millis(self.clock.now()))
        .bind(digest.as_str())
        .execute(&self.pool)
        .await;
        if let Err(e) = bumped {
            warn!(error = %e, digest = %digest.short(), "Failed to record cache access");
        }

        debug!(digest = %digest.short(), "Cache hit");
        Ok(Some(result))
    }

    async fn save(
        &self,
        digest: &ContentDigest,
        result: &TimedText,
        file_size: u64,
    ) -> Result<(), DomainError> {
        let json = encode_result(result)?;
        let now = to_millis(self.clock.now());

        sqlx::query(
            "INSERT INTO job_cache (file_hash, result, file_size, created_at, access_count, last_accessed) \
             VALUES (?, ?, ?, ?, 1, ?) \
             ON CONFLICT(file_hash) DO UPDATE SET result = excluded.result, file_size = excluded.file_size",
        )
        .bind(digest.as_str())
        .bind(json)
        .bind(file_size as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(digest = %digest.short(), file_size, "Cached result");
        Ok(())
    }

    async fn cache_entry(&self, digest: &ContentDigest) -> Result<Option<CacheEntry>, DomainError> {
        let row = sqlx::query(
            "SELECT file_hash, result, file_size, created_at, access_count, last_accessed \
             FROM job_cache WHERE file_hash = ?",
        )
        .bind(digest.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.try_get("result")?;
        Ok(Some(CacheEntry {
            content_digest: ContentDigest::from_hex(row.try_get::<String, _>("file_hash")?),
            result: decode_result(&json)?,
            file_size: row.try_get::<i64, _>("file_size")?.max(0) as u64,
            created_at: from_millis(row.try_get("created_at")?),
            access_count: row.try_get::<i64, _>("access_count")?.max(0) as u64,
            last_accessed: from_millis(row.try_get("last_accessed")?),
        }))
    }

    async fn record_job_created(&self, job: &Job) -> Result<(), DomainError> {
        let result = job.result.as_ref().map(encode_result).transpose()?;

        sqlx::query(
            "INSERT INTO jobs (id, filename, file_hash, status, created_at, started_at, \
             completed_at, result, error, file_size, processing_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.as_str())
        .bind(job.filename.as_str())
        .bind(job.content_digest.as_ref().map(|d| d.as_str().to_string()))
        .bind(job.status.as_str())
        .bind(to_millis(job.created_at))
        .bind(job.started_at.map(to_millis))
        .bind(job.completed_at.map(to_millis))
        .bind(result)
        .bind(job.error.as_deref())
        .bind(job.file_size as i64)
        .bind(job.processing_time)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %job.id, status = %job.status, "Job recorded");
        Ok(())
    }

    async fn update_job_status(&self, id: &JobId, update: &JobUpdate) -> Result<bool, DomainError> {
        let predecessors = update.status.predecessors();
        if predecessors.is_empty() {
            return Ok(false);
        }

        let placeholders = predecessors.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE jobs SET status = ?, \
             completed_at = COALESCE(?, completed_at), \
             processing_time = COALESCE(?, processing_time), \
             result = COALESCE(?, result), \
             error = COALESCE(?, error) \
             WHERE id = ? AND status IN ({})",
            placeholders
        );

        let result = update.result.as_ref().map(encode_result).transpose()?;

        let mut query = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(update.completed_at.map(to_millis))
            .bind(update.processing_time)
            .bind(result)
            .bind(update.error.as_deref())
            .bind(id.as_str());
        for status in predecessors {
            query = query.bind(status.as_str());
        }

        let affected = query.execute(&self.pool).await?.rows_affected();
        debug!(job_id = %id, status = %update.status, applied = affected > 0, "Job status update");
        Ok(affected > 0)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, DomainError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn purge_cache_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM job_cache WHERE last_accessed < ?")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_jobs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM jobs WHERE created_at < ?")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<StoreStats, DomainError> {
        let jobs = sqlx::query(
            "SELECT COUNT(*) AS total_jobs, \
             COUNT(CASE WHEN status = 'completed' THEN 1 END) AS completed_jobs, \
             COUNT(CASE WHEN status = 'failed' THEN 1 END) AS failed_jobs, \
             AVG(processing_time) AS avg_processing_time, \
             COALESCE(SUM(file_size), 0) AS total_bytes_processed \
             FROM jobs WHERE created_at > ?",
        )
        .bind(to_millis(since))
        .fetch_one(&self.pool)
        .await?;

        let cache = sqlx::query(
            "SELECT COUNT(*) AS cache_entries, \
             COALESCE(SUM(access_count), 0) AS total_cache_hits, \
             COALESCE(SUM(file_size), 0) AS cached_bytes \
             FROM job_cache",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            since: Some(since),
            jobs: JobStats {
                total_jobs: jobs.try_get::<i64, _>("total_jobs")?.max(0) as u64,
                completed_jobs: jobs.try_get::<i64, _>("completed_jobs")?.max(0) as u64,
                failed_jobs: jobs.try_get::<i64, _>("failed_jobs")?.max(0) as u64,
                avg_processing_time: jobs.try_get("avg_processing_time")?,
                total_bytes_processed: jobs.try_get::<i64, _>("total_bytes_processed")?.max(0)
                    as u64,
            },
            cache: CacheStats {
                cache_entries: cache.try_get::<i64, _>("cache_entries")?.max(0) as u64,
                total_cache_hits: cache.try_get::<i64, _>("total_cache_hits")?.max(0) as u64,
                cached_bytes: cache.try_get::<i64, _>("cached_bytes")?.max(0) as u64,
            },
        })
    }
}
