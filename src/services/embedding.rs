//! Embedding provider contract, the HTTP provider, and the normalizing
//! `Embedder` adapter used by ingestion and retrieval.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;
use crate::services::cache::{CacheStats, EmbeddingCache, policy_for};

/// External service that turns text into a raw (not necessarily normalized) vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

/// Response from the /embed endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Client for a text-embeddings-inference style server.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    batch_size: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            batch_size: (config.batch_size as usize).max(1),
        })
    }

    /// Check if the embedding server is reachable and healthy.
    pub async fn health_check(&self) -> Result<(), EmbeddingError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ProviderUnavailable(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: texts,
            truncate: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("status {}: {}", status, body);
            return Err(
                if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    EmbeddingError::ProviderUnavailable(message)
                } else {
                    EmbeddingError::InvalidResponse(message)
                },
            );
        }

        let EmbedResponse(embeddings) = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.embed_single_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_single_batch(batch).await?);
        }
        Ok(all_embeddings)
    }
}

/// Scale `v` to unit length. A zero or non-finite norm has no direction and
/// is rejected rather than producing NaNs.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= 0.0 {
        return Err(EmbeddingError::Degenerate);
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Provider-agnostic embedding adapter: validates, normalizes and caches.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<Mutex<EmbeddingCache>>,
    dimension: Option<usize>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: None,
            dimension: None,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        let mut embedder = Self::new(provider);
        if config.dimension > 0 {
            embedder = embedder.with_dimension(config.dimension as usize);
        }
        if config.cache_enabled {
            embedder = embedder.with_cache(EmbeddingCache::new(
                config.cache_capacity,
                policy_for(config.cache_policy),
            ));
        }
        embedder
    }

    #[must_use]
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if let Some(hit) = self.cache_lock().and_then(|mut cache| cache.get(text)) {
            return Ok(hit);
        }

        let raw = self.provider.embed(text).await?;
        let vector = self.finish(raw)?;

        if let Some(mut cache) = self.cache_lock() {
            cache.insert(text, vector.clone());
        }
        Ok(vector)
    }

    /// Embed many texts, sending only cache misses to the provider.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut out: Vec<Option<Vec<f32>>> = match self.cache_lock() {
            Some(mut cache) => texts.iter().map(|t| cache.get(t)).collect(),
            None => vec![None; texts.len()],
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let request: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let raw = self.provider.embed_batch(&request).await?;
            if raw.len() != request.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    request.len(),
                    raw.len()
                )));
            }

            let vectors = raw
                .into_iter()
                .map(|v| self.finish(v))
                .collect::<Result<Vec<_>, _>>()?;

            let mut cache = self.cache_lock();
            for (&i, vector) in missing.iter().zip(vectors) {
                if let Some(cache) = cache.as_mut() {
                    cache.insert(&texts[i], vector.clone());
                }
                out[i] = Some(vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache_lock().map(|cache| cache.stats())
    }

    fn finish(&self, raw: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(expected) = self.dimension
            && raw.len() != expected
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: raw.len(),
            });
        }
        normalize(&raw)
    }

    fn cache_lock(&self) -> Option<MutexGuard<'_, EmbeddingCache>> {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedEmbeddingProvider, HashingEmbeddingProvider};

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(matches!(normalize(&[0.0, 0.0]), Err(EmbeddingError::Degenerate)));
        assert!(matches!(normalize(&[]), Err(EmbeddingError::Degenerate)));
        assert!(matches!(
            normalize(&[f32::NAN, 1.0]),
            Err(EmbeddingError::Degenerate)
        ));
    }

    #[tokio::test]
    async fn test_embeddings_are_normalized() {
        let embedder = Embedder::new(Arc::new(HashingEmbeddingProvider::new(16)));
        for text in ["Cats are mammals.", "What are cats?", "x", "Photosynthesis uses light."] {
            let v = embedder.embed(text).await.unwrap();
            assert_eq!(v.len(), 16);
            assert!((norm(&v) - 1.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_zero_vector_is_degenerate() {
        let embedder = Embedder::new(Arc::new(FixedEmbeddingProvider(vec![0.0; 8])));
        let result = embedder.embed("anything").await;
        assert!(matches!(result, Err(EmbeddingError::Degenerate)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let embedder =
            Embedder::new(Arc::new(HashingEmbeddingProvider::new(8))).with_dimension(16);
        let result = embedder.embed("text").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let embedder = Embedder::new(Arc::new(HashingEmbeddingProvider::new(8)));
        assert!(matches!(
            embedder.embed("  ").await,
            Err(EmbeddingError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_text() {
        let provider = Arc::new(HashingEmbeddingProvider::new(8));
        let embedder = Embedder::new(provider.clone()).with_cache(EmbeddingCache::lru(4));

        let first = embedder.embed("repeated text").await.unwrap();
        let second = embedder.embed("repeated text").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
        let stats = embedder.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_batch_only_fetches_misses() {
        let provider = Arc::new(HashingEmbeddingProvider::new(8));
        let embedder = Embedder::new(provider.clone()).with_cache(EmbeddingCache::lru(8));

        let single = embedder.embed("b").await.unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1], single);
        assert_eq!(provider.calls(), 3);
        for v in &batch {
            assert!((norm(v) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_http_provider_trims_base_url() {
        let config = EmbeddingConfig {
            url: "http://localhost:11411/".to_string(),
            ..Default::default()
        };
        let provider = HttpEmbeddingProvider::new(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11411");
    }
}
