use serde::{Deserialize, Serialize};

/// Curriculum subject a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subject {
    Mathematics,
    Science,
    English,
    History,
    Geography,
    ComputerScience,
    General,
}

impl Subject {
    pub const ALL: [Subject; 7] = [
        Subject::Mathematics,
        Subject::Science,
        Subject::English,
        Subject::History,
        Subject::Geography,
        Subject::ComputerScience,
        Subject::General,
    ];

    /// Name stored in index metadata and used in filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "MATHEMATICS",
            Subject::Science => "SCIENCE",
            Subject::English => "ENGLISH",
            Subject::History => "HISTORY",
            Subject::Geography => "GEOGRAPHY",
            Subject::ComputerScience => "COMPUTER_SCIENCE",
            Subject::General => "GENERAL",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mathematics",
            Subject::Science => "science",
            Subject::English => "English",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::ComputerScience => "computer science",
            Subject::General => "general knowledge",
        }
    }

    /// Leading instruction for answer prompts scoped to this subject.
    pub fn instruction(&self) -> String {
        format!(
            "You are a patient {} tutor. Explain step by step at a level a student can follow.",
            self.display_name()
        )
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == normalized)
            .or(match normalized.as_str() {
                "MATH" | "MATHS" => Some(Subject::Mathematics),
                "CS" => Some(Subject::ComputerScience),
                _ => None,
            })
            .ok_or_else(|| format!("unknown subject: {}", s))
    }
}

/// A reference document to be ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub subject: Subject,
    pub title: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Id of the indexed vector for the given chunk of this document.
    pub fn chunk_id(&self, chunk_index: usize) -> String {
        format!("{}_{}", self.id, chunk_index)
    }
}

impl DocumentMetadata {
    pub fn new(subject: Subject, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            subject,
            title: title.into(),
            source: source.into(),
            difficulty: None,
            tags: Vec::new(),
        }
    }
}

/// A contiguous slice of a document's content: `text == content[start_offset..end_offset]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}
