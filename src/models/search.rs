//! Index records, search results and filters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::document::Subject;

/// Metadata keys written for every indexed chunk.
pub mod keys {
    pub const DOCUMENT_ID: &str = "document_id";
    pub const SUBJECT: &str = "subject";
    pub const TITLE: &str = "title";
    pub const SOURCE: &str = "source";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const DIFFICULTY: &str = "difficulty";
    pub const TAGS: &str = "tags";
}

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A chunk embedding as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    /// `<documentId>_<chunkIndex>`
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

impl IndexedVector {
    pub fn title(&self) -> &str {
        self.metadata
            .get(keys::TITLE)
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// A retrieved vector with its score: cosine similarity after retrieval,
/// relevance on a 0-10 scale after reranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: IndexedVector,
    pub score: f32,
}

/// Equality conditions over metadata; every condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(subject: Subject) -> Self {
        Self::new().with(keys::SUBJECT, subject.as_str())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        self.conditions
            .iter()
            .all(|(k, v)| metadata.get(k) == Some(v))
    }
}
