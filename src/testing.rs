//! Shared fakes for unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::transcription::{RawSegment, RawWord};
use crate::domain::{DomainError, RawTranscript, TimedText};
use crate::ports::{Clock, Transcriber};

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z, whole milliseconds so stored values compare equal.
        Self::at(DateTime::from_timestamp_millis(1_704_067_200_000).unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Raw transcript with one segment whose words are the whitespace-split `text`.
pub(crate) fn sample_raw(text: &str) -> RawTranscript {
    let words = text
        .split_whitespace()
        .enumerate()
        .map(|(i, w)| RawWord {
            word: format!(" {}", w),
            start: i as f64,
            end: i as f64 + 0.5,
            probability: Some(0.75),
        })
        .collect::<Vec<_>>();
    let end = words.len() as f64;

    RawTranscript {
        text: text.to_string(),
        language: Some("en".to_string()),
        segments: vec![RawSegment {
            start: 0.0,
            end,
            text: text.to_string(),
            words,
        }],
        processing_time: 2.0,
        processed_at: None,
    }
}

pub(crate) fn sample_timed_text(text: &str) -> TimedText {
    TimedText::from_raw(sample_raw(text))
}

/// Write `bytes` to `dir/name` and return the path.
pub(crate) fn write_media(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// In-process transcriber that records how it was driven.
pub(crate) struct FakeTranscriber {
    delay: Duration,
    text: String,
    failure: Option<fn() -> DomainError>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl FakeTranscriber {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            text: text.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self, failure: fn() -> DomainError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn run(&self, path: &Path) -> Result<RawTranscript, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().push(path.to_path_buf());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.failure {
            Some(failure) => Err(failure()),
            None => {
                let mut raw = sample_raw(&self.text);
                raw.processed_at = Some(Utc::now());
                Ok(raw)
            }
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
