//! Vector index contract.
//!
//! The engine only consumes an index: it inserts chunk vectors and asks for
//! the nearest neighbours of a query vector. Storage, ANN structures and
//! persistence belong to the backend behind this trait.

mod qdrant;

pub use qdrant::QdrantIndex;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{IndexedVector, MetadataFilter, SearchResult};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Check if the index is reachable.
    async fn health_check(&self) -> Result<(), IndexError>;

    /// Store one vector. Inserting an existing id replaces it.
    async fn insert(&self, vector: IndexedVector) -> Result<(), IndexError>;

    /// Top-`k` vectors by cosine similarity, highest first, restricted to
    /// entries whose metadata matches `filter`.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexError>;

    /// Compact or rebuild internal structures after a bulk load.
    async fn optimize(&self) -> Result<(), IndexError>;
}
