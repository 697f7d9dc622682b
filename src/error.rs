//! Error types for the RAG engine.

use std::time::Duration;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding has zero norm and cannot be normalized")]
    Degenerate,

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ProviderUnavailable(_) | EmbeddingError::Timeout
        )
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EmbeddingError::Timeout
        } else if e.is_connect() || e.is_request() {
            EmbeddingError::ProviderUnavailable(e.to_string())
        } else {
            EmbeddingError::InvalidResponse(e.to_string())
        }
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("insert error: {0}")]
    InsertFailed(String),

    #[error("search error: {0}")]
    SearchFailed(String),
}

/// Errors related to text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation timeout")]
    Timeout,

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("unknown model tier: {0}")]
    UnknownTier(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if e.is_decode() {
            GenerationError::InvalidResponse(e.to_string())
        } else {
            GenerationError::Unavailable(e.to_string())
        }
    }
}

/// Errors related to retrieval.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors related to corpus ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingestion failed: all {failed} documents of batch {batch} failed")]
    IngestionFailed { batch: usize, failed: usize },

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
}

/// Errors surfaced by the orchestrator to its caller.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("retrieval failed: {0}")]
    Search(#[from] SearchError),

    #[error("generation failed: {0}")]
    Generation(GenerationError),

    #[error("generation timed out")]
    GenerationTimeout,

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl From<GenerationError> for QueryError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Timeout => QueryError::GenerationTimeout,
            other => QueryError::Generation(other),
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to loading documents from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("invalid document at position {position}: {reason}")]
    InvalidDocument { position: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ProviderUnavailable("down".to_string()).is_retryable());
        assert!(!EmbeddingError::Degenerate.is_retryable());
        assert!(!EmbeddingError::InvalidResponse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_generation_timeout_maps_to_typed_query_error() {
        let err: QueryError = GenerationError::Timeout.into();
        assert!(matches!(err, QueryError::GenerationTimeout));

        let err: QueryError = GenerationError::Unavailable("503".to_string()).into();
        assert!(matches!(err, QueryError::Generation(_)));
    }
}
