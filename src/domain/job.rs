use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::digest::ContentDigest;
use crate::domain::transcription::TimedText;

/// Opaque unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle state.
///
/// State transitions:
/// - Pending -> Processing (cache miss, dispatched to the pool)
/// - Pending -> Completed (cache hit)
/// - Pending -> Failed (digest failure)
/// - Processing -> Completed | Failed
///
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// States from which a job may move into `self`.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => {
                &[JobStatus::Pending, JobStatus::Processing]
            }
        }
    }

    #[must_use]
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted transcription request as recorded in the job ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    /// None until the digest has been computed (stays None if digesting failed).
    pub content_digest: Option<ContentDigest>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub file_size: u64,
    /// Seconds.
    pub processing_time: Option<f64>,
    pub result: Option<TimedText>,
    pub error: Option<String>,
}

impl Job {
    /// Create a pending job that starts now.
    pub fn new(filename: impl Into<String>, file_size: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            filename: filename.into(),
            content_digest: None,
            status: JobStatus::Pending,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
            file_size,
            processing_time: None,
            result: None,
            error: None,
        }
    }
}

/// A ledger mutation applied by `ResultStore::update_job_status`.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time: Option<f64>,
    pub result: Option<TimedText>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            completed_at: None,
            processing_time: None,
            result: None,
            error: None,
        }
    }

    pub fn completed(at: DateTime<Utc>, processing_time: f64, result: TimedText) -> Self {
        Self {
            status: JobStatus::Completed,
            completed_at: Some(at),
            processing_time: Some(processing_time),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, processing_time: f64, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            completed_at: Some(at),
            processing_time: Some(processing_time),
            result: None,
            error: Some(error.into()),
        }
    }
}
