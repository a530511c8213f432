pub mod cache;
pub mod config;
pub mod digest;
pub mod error;
pub mod job;
pub mod pool;
pub mod transcription;

pub use cache::{CacheEntry, CacheStats, JobStats, StoreStats};
pub use config::AppConfig;
pub use digest::ContentDigest;
pub use error::{DomainError, JobFailure};
pub use job::{Job, JobId, JobStatus, JobUpdate};
pub use pool::{PoolStatus, PoolWorker};
pub use transcription::{RawTranscript, TimedText};
