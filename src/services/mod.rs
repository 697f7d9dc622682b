pub mod cache;
pub mod chunker;
pub mod context;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod orchestrator;
pub mod rerank;
pub mod retriever;
pub mod tokens;

pub use cache::{EmbeddingCache, EvictionPolicy, LeastFrequentlyUsed, LeastRecentlyUsed};
pub use chunker::TextChunker;
pub use context::ContextBuilder;
pub use embedding::{Embedder, EmbeddingProvider, HttpEmbeddingProvider, normalize};
pub use generation::{GenerationParams, HttpGenerator, ModelTiers, TextGenerator};
pub use index::{QdrantIndex, VectorIndex};
pub use ingest::{IngestReport, Ingestor};
pub use orchestrator::{Answer, Orchestrator};
pub use rerank::{FirstNumberScoreParser, Reranker, ScoreParser};
pub use retriever::Retriever;
pub use tokens::{CharRatioEstimator, TokenEstimator, estimate_tokens};
