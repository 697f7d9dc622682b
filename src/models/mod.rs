mod config;
mod document;
mod search;

pub use config::{
    CONFIG_ENV, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_URL,
    DEFAULT_GENERATION_URL, DEFAULT_QDRANT_URL, EmbeddingConfig, EvictionPolicyKind,
    GenerationConfig, IndexConfig, IngestionConfig, OutputConfig, RetrievalConfig, TIER_BALANCED,
    TIER_FAST, TIER_QUALITY, TierConfig,
};
pub use document::{Chunk, Document, DocumentMetadata, Subject};
pub use search::{IndexedVector, MetadataFilter, OutputFormat, SearchResult, keys};
