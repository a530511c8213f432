use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sentence closes after this many words even without terminal punctuation.
pub const MAX_SENTENCE_WORDS: usize = 15;
/// A paragraph closes after this many sentences.
pub const MAX_PARAGRAPH_SENTENCES: usize = 4;
/// Confidence assigned to words the transcriber reported no probability for.
pub const DEFAULT_WORD_CONFIDENCE: f64 = 0.95;

/// Word as emitted by the external transcriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub probability: Option<f64>,
}

/// Segment as emitted by the external transcriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<RawWord>,
}

/// Structured output of one external transcription run.
///
/// Unknown fields in the transcriber's JSON are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    /// Wall-clock seconds, attached by the adapter.
    #[serde(default)]
    pub processing_time: f64,
    /// Attached by the adapter.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Indices into `TimedText::words`.
    pub words: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Indices into `TimedText::sentences`.
    pub sentences: Vec<usize>,
}

/// Normalized transcription result: words grouped into sentences and paragraphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedText {
    pub full_text: String,
    pub language: Option<String>,
    /// Seconds of media covered by the transcript.
    pub duration: f64,
    pub words: Vec<Word>,
    pub sentences: Vec<Sentence>,
    pub paragraphs: Vec<Paragraph>,
    /// Seconds spent producing this result.
    pub processing_time: f64,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TimedText {
    /// Normalize a raw transcript into words, sentences and paragraphs.
    pub fn from_raw(raw: RawTranscript) -> Self {
        let words = flatten_words(&raw.segments);
        let sentences = group_sentences(&words);
        let paragraphs = group_paragraphs(&sentences);
        let duration = raw
            .segments
            .iter()
            .map(|s| s.end)
            .fold(0.0_f64, f64::max);

        Self {
            full_text: raw.text,
            language: raw.language,
            duration,
            words,
            sentences,
            paragraphs,
            processing_time: raw.processing_time,
            processed_at: raw.processed_at,
        }
    }
}

fn flatten_words(segments: &[RawSegment]) -> Vec<Word> {
    segments
        .iter()
        .flat_map(|segment| segment.words.iter())
        .map(|w| Word {
            text: w.word.trim().to_string(),
            start: w.start,
            end: w.end,
            confidence: w.probability.unwrap_or(DEFAULT_WORD_CONFIDENCE),
        })
        .collect()
}

fn ends_sentence(text: &str) -> bool {
    text.ends_with(['.', '!', '?'])
}

fn group_sentences(words: &[Word]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut indices: Vec<usize> = Vec::new();

    for (index, word) in words.iter().enumerate() {
        indices.push(index);

        let is_last = index + 1 == words.len();
        if ends_sentence(&word.text) || indices.len() >= MAX_SENTENCE_WORDS || is_last {
            let members = std::mem::take(&mut indices);
            let first = &words[members[0]];
            let text = members
                .iter()
                .map(|&i| words[i].text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            sentences.push(Sentence {
                text,
                start: first.start,
                end: word.end,
                words: members,
            });
        }
    }

    sentences
}

fn group_paragraphs(sentences: &[Sentence]) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut indices: Vec<usize> = Vec::new();

    for (index, sentence) in sentences.iter().enumerate() {
        indices.push(index);

        let is_last = index + 1 == sentences.len();
        if indices.len() >= MAX_PARAGRAPH_SENTENCES || is_last {
            let members = std::mem::take(&mut indices);
            let first = &sentences[members[0]];
            let text = members
                .iter()
                .map(|&i| sentences[i].text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            paragraphs.push(Paragraph {
                text,
                start: first.start,
                end: sentence.end,
                sentences: members,
            });
        }
    }

    paragraphs
}
