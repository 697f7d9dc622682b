//! Query-time retrieval: embed the query and fetch nearest chunks.

use std::sync::Arc;

use crate::error::SearchError;
use crate::models::{MetadataFilter, SearchResult};
use crate::services::embedding::Embedder;
use crate::services::index::VectorIndex;
use crate::utils::retry::{RetryConfig, with_retry};

pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    retry: RetryConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            retry: RetryConfig::single_retry(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Results by descending similarity. With `overfetch`, `2k` candidates
    /// are requested so a reranker has recall to work with.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
        overfetch: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("query cannot be empty".to_string()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let limit = if overfetch { k * 2 } else { k };
        let query_vector = with_retry(&self.retry, || self.embedder.embed(query)).await?;

        let results = self.index.search(&query_vector, limit, filter).await?;
        tracing::debug!(limit, found = results.len(), "retrieved candidates");
        Ok(results)
    }
}
