use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::digest::ContentDigest;
use crate::domain::transcription::TimedText;

/// A cached transcription result, keyed by content digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_digest: ContentDigest,
    pub result: TimedText,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

/// Aggregate ledger statistics over a time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub avg_processing_time: Option<f64>,
    pub total_bytes_processed: u64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_entries: u64,
    pub total_cache_hits: u64,
    pub cached_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub since: Option<DateTime<Utc>>,
    pub jobs: JobStats,
    pub cache: CacheStats,
}
