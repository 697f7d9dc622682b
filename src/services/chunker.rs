//! Sentence-aware text chunking with word overlap.

use std::sync::Arc;

use crate::models::{Chunk, IngestionConfig};
use crate::services::tokens::{CharRatioEstimator, TokenEstimator};

/// Splits document text into overlapping, sentence-bounded chunks.
///
/// Sentences are accumulated until the next one would push the chunk over
/// `target_size` estimated tokens. Each new chunk is seeded with the last
/// `overlap / 2` words of the previous one; the seed is kept even when it
/// pushes the chunk past the target, so a chunk may exceed `target_size` by
/// at most the cost of its seed. A sentence that alone exceeds the target is
/// emitted whole as an oversized chunk, seed included.
#[derive(Clone)]
pub struct TextChunker {
    /// Target chunk size in estimated tokens
    target_size: usize,
    /// Overlap budget; half of it is carried over as trailing words
    overlap: usize,
    estimator: Arc<dyn TokenEstimator>,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("target_size", &self.target_size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Create a chunker from the ingestion configuration.
    pub fn new(config: &IngestionConfig) -> Self {
        Self::with_params(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_params(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            estimator: Arc::new(CharRatioEstimator::default()),
        }
    }

    /// Create a chunker with default settings.
    pub fn with_defaults() -> Self {
        Self::new(&IngestionConfig::default())
    }

    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Chunk `text`. Empty or whitespace-only text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let seed_words = self.overlap / 2;
        let mut chunks = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (sentence_start, sentence_end) in sentence_spans(text) {
            let Some((start, end)) = current else {
                current = Some((sentence_start, sentence_end));
                continue;
            };

            if self.fits(&text[start..sentence_end]) {
                current = Some((start, sentence_end));
                continue;
            }

            chunks.push(make_chunk(text, start, end));

            let next_start =
                tail_words_start(text, start, end, seed_words).unwrap_or(sentence_start);
            current = Some((next_start, sentence_end));
        }

        if let Some((start, end)) = current {
            chunks.push(make_chunk(text, start, end));
        }

        chunks
    }

    fn fits(&self, text: &str) -> bool {
        self.estimator.estimate(text) <= self.target_size
    }
}

fn make_chunk(text: &str, start: usize, end: usize) -> Chunk {
    Chunk {
        text: text[start..end].to_string(),
        start_offset: start,
        end_offset: end,
    }
}

/// Byte spans of sentences, trimmed of surrounding whitespace. A sentence
/// ends at `.`, `!` or `?` followed by whitespace, or at the end of text.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if start.is_none() {
            if c.is_whitespace() {
                continue;
            }
            start = Some(i);
        }

        let terminates = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if terminates && let Some(s) = start.take() {
            spans.push((s, i + c.len_utf8()));
        }
    }

    if let Some(s) = start {
        spans.push((s, text.trim_end().len()));
    }

    spans
}

/// Byte offset where the last `words` whitespace-delimited words of
/// `text[start..end]` begin. The first word is never part of the tail, so a
/// seeded chunk always starts after the chunk it was seeded from.
fn tail_words_start(text: &str, start: usize, end: usize, words: usize) -> Option<usize> {
    if words == 0 {
        return None;
    }

    let mut word_starts = Vec::new();
    let mut prev_whitespace = true;
    for (i, c) in text[start..end].char_indices() {
        if !c.is_whitespace() && prev_whitespace {
            word_starts.push(i);
        }
        prev_whitespace = c.is_whitespace();
    }

    let first = word_starts.len().saturating_sub(words).max(1);
    word_starts.get(first).map(|offset| start + offset)
}
