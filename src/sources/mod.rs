//! Producers of documents for ingestion.

mod json;

pub use json::{JsonDocumentSource, parse_documents};

use crate::error::SourceError;
use crate::models::Document;

/// Something that yields a corpus of documents to ingest.
pub trait DocumentSource: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    fn load(&self) -> Result<Vec<Document>, SourceError>;
}
