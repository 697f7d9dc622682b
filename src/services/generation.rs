//! Text generation contract, the HTTP generator, and named model tiers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::{GenerationConfig, TierConfig};

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

/// Stateless request/response generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpGenerator {
    pub fn new(config: &TierConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unavailable(format!(
                "status {}: {}",
                status, body
            )));
        }

        let GenerateResponse { response } = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        Ok(response)
    }
}

/// Named generation handles (`fast`, `balanced`, `quality`, ...).
///
/// Tiers come from configuration, so adding one is a config change.
#[derive(Clone, Default)]
pub struct ModelTiers {
    tiers: BTreeMap<String, Arc<dyn TextGenerator>>,
}

impl ModelTiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an HTTP generator for every configured tier.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let mut tiers = Self::new();
        for (name, tier) in &config.tiers {
            tiers.register(name.clone(), Arc::new(HttpGenerator::new(tier)?));
        }
        Ok(tiers)
    }

    pub fn register(&mut self, name: impl Into<String>, generator: Arc<dyn TextGenerator>) {
        self.tiers.insert(name.into(), generator);
    }

    #[must_use]
    pub fn with_tier(mut self, name: impl Into<String>, generator: Arc<dyn TextGenerator>) -> Self {
        self.register(name, generator);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        self.tiers
            .get(name)
            .cloned()
            .ok_or_else(|| GenerationError::UnknownTier(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModelTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
