use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "studyrag";
pub const DEFAULT_GENERATION_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

pub const TIER_FAST: &str = "fast";
pub const TIER_BALANCED: &str = "balanced";
pub const TIER_QUALITY: &str = "quality";

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "STUDYRAG_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join("studyrag").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingestion.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.ingestion.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.batch_size must be at least 1".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.query_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.query_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.embedding.cache_capacity == 0 && self.embedding.cache_enabled {
            return Err(ConfigError::ValidationError(
                "embedding.cache_capacity must be at least 1 when the cache is enabled"
                    .to_string(),
            ));
        }
        for tier in [&self.generation.rerank_tier, &self.generation.answer_tier] {
            if !self.generation.tiers.contains_key(tier) {
                return Err(ConfigError::ValidationError(format!(
                    "generation tier '{}' is not configured",
                    tier
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicyKind {
    /// Evict the entry that was used least recently.
    #[default]
    Lru,
    /// Evict the entry with the fewest hits.
    Lfu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: u32,

    /// Expected vector dimension; 0 disables the check.
    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub cache_policy: EvictionPolicyKind,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_embedding_batch_size() -> u32 {
    32
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: default_timeout(),
            batch_size: default_embedding_batch_size(),
            dimension: default_dimension(),
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
            cache_policy: EvictionPolicyKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

/// One named generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_generation_url")]
    pub url: String,

    pub model: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_url() -> String {
    DEFAULT_GENERATION_URL.to_string()
}

impl TierConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            url: default_generation_url(),
            model: model.into(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierConfig>,

    #[serde(default = "default_rerank_tier")]
    pub rerank_tier: String,

    #[serde(default = "default_answer_tier")]
    pub answer_tier: String,
}

fn default_tiers() -> BTreeMap<String, TierConfig> {
    BTreeMap::from([
        (TIER_FAST.to_string(), TierConfig::new("qwen2.5:0.5b")),
        (TIER_BALANCED.to_string(), TierConfig::new("llama3.2:3b")),
        (TIER_QUALITY.to_string(), TierConfig::new("llama3.1:8b")),
    ])
}

fn default_rerank_tier() -> String {
    TIER_FAST.to_string()
}

fn default_answer_tier() -> String {
    TIER_BALANCED.to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            rerank_tier: default_rerank_tier(),
            answer_tier: default_answer_tier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Target chunk size in estimated tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap budget; half of it, in words, is carried into the next chunk.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Documents processed concurrently per batch.
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_ingest_batch_size() -> usize {
    10
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_ingest_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}

fn default_max_context_tokens() -> usize {
    2048
}

fn default_answer_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_query_timeout() -> u64 {
    120
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_tokens: default_max_context_tokens(),
            answer_max_tokens: default_answer_max_tokens(),
            temperature: default_temperature(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.index.collection, DEFAULT_COLLECTION);
        assert_eq!(config.ingestion.batch_size, 10);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_context_tokens, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_tiers() {
        let config = GenerationConfig::default();
        assert!(config.tiers.contains_key(TIER_FAST));
        assert!(config.tiers.contains_key(TIER_BALANCED));
        assert!(config.tiers.contains_key(TIER_QUALITY));
        assert_eq!(config.rerank_tier, TIER_FAST);
        assert_eq!(config.answer_tier, TIER_BALANCED);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ingestion]
            chunk_size = 128

            [generation.tiers.tiny]
            model = "smollm:135m"
            "#,
        )
        .unwrap();

        assert_eq!(config.ingestion.chunk_size, 128);
        assert_eq!(config.ingestion.chunk_overlap, 50);
        assert_eq!(config.generation.tiers["tiny"].url, DEFAULT_GENERATION_URL);
        assert!(!config.generation.tiers.contains_key(TIER_FAST));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 8;
        config.embedding.cache_policy = EvictionPolicyKind::Lfu;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, 8);
        assert_eq!(loaded.embedding.cache_policy, EvictionPolicyKind::Lfu);
    }

    #[test]
    fn test_validation_rejects_zero_query_timeout() {
        let mut config = Config::default();
        config.retrieval.query_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("query_timeout_secs")
        ));

        config.retrieval.query_timeout_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let mut config = Config::default();
        config.ingestion.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
