//! In-process doubles for the external collaborators, used by unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EmbeddingError, GenerationError, IndexError};
use crate::models::{
    Document, DocumentMetadata, IndexedVector, MetadataFilter, SearchResult, Subject,
};
use crate::services::{EmbeddingProvider, GenerationParams, TextGenerator, VectorIndex};

pub fn doc(id: &str, content: &str, subject: Subject) -> Document {
    Document::new(
        id,
        content,
        DocumentMetadata::new(subject, format!("Title of {id}"), "test-pack"),
    )
}

/// Bag-of-words vector: each lowercase word is hashed into a bucket.
fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        let word = word.strip_suffix('s').unwrap_or(&word);
        let hash = word
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        v[(hash % dimension as u64) as usize] += 1.0;
    }
    v
}

#[derive(Debug, Default)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
    calls: AtomicUsize,
    fail_on: Option<String>,
    zero_on: Option<String>,
    unavailable_remaining: AtomicUsize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Texts containing `needle` fail with a non-transient error.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Texts containing `needle` come back as an all-zero vector.
    pub fn zero_on(mut self, needle: &str) -> Self {
        self.zero_on = Some(needle.to_string());
        self
    }

    /// The first `n` calls fail as transiently unavailable.
    pub fn unavailable_first(self, n: usize) -> Self {
        self.unavailable_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .unavailable_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EmbeddingError::ProviderUnavailable("warming up".to_string()));
        }
        if self.fail_on.as_deref().is_some_and(|n| text.contains(n)) {
            return Err(EmbeddingError::InvalidResponse("rejected".to_string()));
        }
        if self.zero_on.as_deref().is_some_and(|n| text.contains(n)) {
            return Ok(vec![0.0; self.dimension]);
        }
        Ok(hash_embed(text, self.dimension))
    }
}

/// Returns the same raw vector for every text.
#[derive(Debug, Clone)]
pub struct FixedEmbeddingProvider(pub Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }
}

/// Records how many embed calls overlap in time.
#[derive(Debug)]
pub struct ConcurrencyProbeProvider {
    dimension: usize,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ConcurrencyProbeProvider {
    pub fn new(dimension: usize, delay: Duration) -> Self {
        Self {
            dimension,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ConcurrencyProbeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(hash_embed(text, self.dimension))
    }
}

/// Exact brute-force index over unit vectors.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    vectors: RwLock<BTreeMap<String, IndexedVector>>,
    optimize_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<IndexedVector> {
        self.vectors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn health_check(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn insert(&self, vector: IndexedVector) -> Result<(), IndexError> {
        self.vectors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(vector.id.clone(), vector);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let vectors = self.vectors.read().unwrap_or_else(|e| e.into_inner());
        let mut results: Vec<SearchResult> = vectors
            .values()
            .filter(|v| filter.is_none_or(|f| f.matches(&v.metadata)))
            .map(|v| SearchResult {
                score: v.embedding.iter().zip(vector).map(|(a, b)| a * b).sum(),
                document: v.clone(),
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);
        Ok(results)
    }

    async fn optimize(&self) -> Result<(), IndexError> {
        self.optimize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Index whose every call fails as unavailable.
#[derive(Debug, Default)]
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn health_check(&self) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }

    async fn insert(&self, _vector: IndexedVector) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }

    async fn search(
        &self,
        _vector: &[f32],
        _k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }

    async fn optimize(&self) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }
}

type Script = Box<dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync>;

/// Generator answering from a closure over the prompt; records every prompt.
pub struct ScriptedGenerator {
    script: Script,
    delay: Option<Duration>,
    prompts: Mutex<Vec<(String, GenerationParams)>>,
}

impl ScriptedGenerator {
    pub fn from_fn(
        script: impl Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn constant(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<(String, GenerationParams)> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt.to_string(), params));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(prompt)
    }
}
