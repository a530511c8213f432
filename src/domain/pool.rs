use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One slot of transcription concurrency.
///
/// Lifecycle: Idle -> Busy -> Idle, or Busy -> Retired once `use_count`
/// reaches the pool's per-worker limit. Retired workers are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolWorker {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub use_count: u32,
}

impl PoolWorker {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            use_count: 0,
        }
    }

    /// Whether this worker has reached `max_uses` and must be retired.
    #[must_use]
    pub fn is_exhausted(&self, max_uses: u32) -> bool {
        self.use_count >= max_uses
    }
}

/// Point-in-time view of the pool for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Workers currently alive (idle + busy).
    pub size: usize,
    pub busy: usize,
    pub idle: usize,
    /// Callers waiting for a worker.
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_exhaustion() {
        let mut worker = PoolWorker::new(1);
        assert!(!worker.is_exhausted(10));
        worker.use_count = 10;
        assert!(worker.is_exhausted(10));
    }
}
