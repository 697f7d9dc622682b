//! Documents from a JSON array or JSON Lines file.

use std::collections::HashSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::models::Document;
use crate::sources::DocumentSource;

/// Reads documents from a file, or from stdin when the path is `-`.
///
/// Either a single JSON array of documents or one document per line:
///
/// ```json
/// {"id": "frac-1", "content": "...", "metadata": {"subject": "MATHEMATICS", "title": "Fractions", "source": "pack-1"}}
/// ```
#[derive(Debug, Clone)]
pub struct JsonDocumentSource {
    path: PathBuf,
}

impl JsonDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }

    fn read_input(&self) -> Result<String, SourceError> {
        if self.is_stdin() {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        } else {
            Ok(std::fs::read_to_string(&self.path)?)
        }
    }
}

impl DocumentSource for JsonDocumentSource {
    fn name(&self) -> &str {
        if self.is_stdin() { "stdin" } else { "json" }
    }

    fn load(&self) -> Result<Vec<Document>, SourceError> {
        let documents = parse_documents(&self.read_input()?)?;
        tracing::debug!(path = %self.path.display(), count = documents.len(), "loaded documents");
        Ok(documents)
    }
}

/// Parse and validate documents. Positions in errors are 1-based: the array
/// element for JSON arrays, the line number for JSON Lines.
pub fn parse_documents(input: &str) -> Result<Vec<Document>, SourceError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let positioned: Vec<(usize, Document)> = if input.starts_with('[') {
        serde_json::from_str::<Vec<Document>>(input)?
            .into_iter()
            .enumerate()
            .map(|(i, doc)| (i + 1, doc))
            .collect()
    } else {
        let mut documents = Vec::new();
        for (i, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let doc = serde_json::from_str(line).map_err(|e| SourceError::InvalidDocument {
                position: i + 1,
                reason: e.to_string(),
            })?;
            documents.push((i + 1, doc));
        }
        documents
    };

    let mut seen = HashSet::new();
    for (position, doc) in &positioned {
        validate(*position, doc)?;
        if !seen.insert(doc.id.as_str()) {
            return Err(SourceError::InvalidDocument {
                position: *position,
                reason: format!("duplicate id '{}'", doc.id),
            });
        }
    }

    Ok(positioned.into_iter().map(|(_, doc)| doc).collect())
}

fn validate(position: usize, doc: &Document) -> Result<(), SourceError> {
    let reason = if doc.id.trim().is_empty() {
        "id is empty"
    } else if doc.id.chars().any(char::is_whitespace) {
        "id contains whitespace"
    } else if doc.content.trim().is_empty() {
        "content is empty"
    } else {
        return Ok(());
    };
    Err(SourceError::InvalidDocument {
        position,
        reason: reason.to_string(),
    })
}
