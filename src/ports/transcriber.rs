use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, RawTranscript};

/// Port for one external transcription run.
///
/// Implementations own the process boundary: launching, timeout enforcement
/// and decoding of the structured output.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the media file at `path`.
    ///
    /// The returned transcript carries `processing_time` and `processed_at`.
    async fn run(&self, path: &Path) -> Result<RawTranscript, DomainError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}
