//! Corpus ingestion: chunk, embed and index documents in bounded batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::error::{EmbeddingError, IndexError, IngestError};
use crate::models::{Document, IndexedVector, IngestionConfig, keys};
use crate::services::chunker::TextChunker;
use crate::services::embedding::Embedder;
use crate::services::index::VectorIndex;
use crate::utils::retry::{RetryConfig, with_retry};

const DEFAULT_DIFFICULTY: &str = "medium";

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents_total: usize,
    pub documents_ingested: usize,
    pub documents_failed: usize,
    pub chunks_indexed: usize,
}

enum DocumentFailure {
    Embedding(EmbeddingError),
    Index(IndexError),
}

pub struct Ingestor {
    chunker: TextChunker,
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    retry: RetryConfig,
}

impl Ingestor {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            batch_size: batch_size.max(1),
            retry: RetryConfig::single_retry(),
        }
    }

    pub fn from_config(
        config: &IngestionConfig,
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self::new(TextChunker::new(config), embedder, index, config.batch_size)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest `documents`, batch by batch. Documents inside a batch run
    /// concurrently and the batch is joined before the next one starts. A
    /// document whose embedding fails is skipped; a batch in which every
    /// document fails aborts the run, as does any index failure.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport {
            documents_total: documents.len(),
            ..Default::default()
        };

        for (batch_no, batch) in documents.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = batch_no, size = batch.len(), "ingesting batch");

            let outcomes = join_all(batch.iter().map(|doc| self.ingest_document(doc))).await;

            let mut failed = 0;
            for (doc, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(chunks) => {
                        report.documents_ingested += 1;
                        report.chunks_indexed += chunks;
                    }
                    Err(DocumentFailure::Embedding(e)) => {
                        tracing::warn!(document = %doc.id, error = %e, "skipping document");
                        failed += 1;
                    }
                    Err(DocumentFailure::Index(e)) => return Err(IngestError::Index(e)),
                }
            }
            report.documents_failed += failed;

            if failed == batch.len() {
                return Err(IngestError::IngestionFailed {
                    batch: batch_no,
                    failed,
                });
            }
        }

        self.index.optimize().await?;

        tracing::info!(
            documents = report.documents_ingested,
            failed = report.documents_failed,
            chunks = report.chunks_indexed,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn ingest_document(&self, doc: &Document) -> Result<usize, DocumentFailure> {
        let chunks = self.chunker.chunk(&doc.content);
        if chunks.is_empty() {
            tracing::debug!(document = %doc.id, "document has no content");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = with_retry(&self.retry, || self.embedder.embed_batch(&texts))
            .await
            .map_err(DocumentFailure::Embedding)?;

        let total = chunks.len();
        for (i, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let vector = IndexedVector {
                id: doc.chunk_id(i),
                content: chunk.text,
                embedding,
                metadata: chunk_metadata(doc, i, total),
            };
            self.index
                .insert(vector)
                .await
                .map_err(DocumentFailure::Index)?;
        }

        tracing::debug!(document = %doc.id, chunks = total, "document indexed");
        Ok(total)
    }
}

fn chunk_metadata(doc: &Document, chunk_index: usize, total_chunks: usize) -> BTreeMap<String, String> {
    let meta = &doc.metadata;
    BTreeMap::from([
        (keys::DOCUMENT_ID.to_string(), doc.id.clone()),
        (keys::SUBJECT.to_string(), meta.subject.as_str().to_string()),
        (keys::TITLE.to_string(), meta.title.clone()),
        (keys::SOURCE.to_string(), meta.source.clone()),
        (keys::CHUNK_INDEX.to_string(), chunk_index.to_string()),
        (keys::TOTAL_CHUNKS.to_string(), total_chunks.to_string()),
        (
            keys::DIFFICULTY.to_string(),
            meta.difficulty
                .clone()
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        ),
        (keys::TAGS.to_string(), meta.tags.join(",")),
    ])
}
