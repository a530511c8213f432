use std::time::Duration;

use thiserror::Error;

use crate::domain::job::JobId;

/// Domain-level errors for scribed.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The input file could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// The external transcriber exceeded its wall-clock budget and was killed.
    #[error("Transcription timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The external transcriber could not be started.
    #[error("Failed to launch transcriber: {0}")]
    Launch(String),

    /// The external transcriber exited unsuccessfully.
    #[error("Transcriber failed ({status}): {stderr}")]
    TranscriberFailed { status: String, stderr: String },

    /// The transcriber output did not contain a parseable JSON object.
    #[error("Malformed transcriber output: {0}")]
    MalformedOutput(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Worker pool closed")]
    PoolClosed,
}

impl DomainError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Config(_) => "config",
            DomainError::Serialization(_) => "serialization",
            DomainError::Io(_) => "io",
            DomainError::Timeout(_) => "timeout",
            DomainError::Launch(_) => "launch",
            DomainError::TranscriberFailed { .. } => "transcriber_failed",
            DomainError::MalformedOutput(_) => "malformed_output",
            DomainError::Store(_) => "store",
            DomainError::PoolClosed => "pool_closed",
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Store(err.to_string())
    }
}

/// A failed transcription request, tagged with the job it was recorded under.
#[derive(Error, Debug)]
#[error("Job {job_id} failed: {source}")]
pub struct JobFailure {
    pub job_id: JobId,
    #[source]
    pub source: DomainError,
}

impl JobFailure {
    pub fn new(job_id: JobId, source: DomainError) -> Self {
        Self { job_id, source }
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = [
            DomainError::Io("x".into()),
            DomainError::Timeout(Duration::from_secs(1)),
            DomainError::Launch("x".into()),
            DomainError::TranscriberFailed {
                status: "exit status: 1".into(),
                stderr: "x".into(),
            },
            DomainError::MalformedOutput("x".into()),
            DomainError::Store("x".into()),
        ];

        let mut kinds: Vec<_> = errors.iter().map(DomainError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_timeout_message() {
        let err = DomainError::Timeout(Duration::from_secs(600));
        assert_eq!(err.to_string(), "Transcription timed out after 600s");
    }

    #[test]
    fn test_job_failure_carries_job_id() {
        let id = JobId::new();
        let failure = JobFailure::new(id.clone(), DomainError::Io("gone".into()));
        assert_eq!(failure.kind(), "io");
        assert!(failure.to_string().contains(&id.to_string()));
    }
}
