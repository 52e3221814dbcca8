//! Retrieved documents and indexable chunks

use serde::{Deserialize, Serialize};

/// Source file types accepted by the indexer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// HTML document (indexed as raw text)
    Html,
    /// CSV file
    Csv,
    /// JSON document
    Json,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "csv" => Self::Csv,
            "json" | "jsonl" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Whether the indexer can read this type as text
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A document returned by vector search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier in the search index
    pub id: String,
    /// Text content
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Documents in relevance order (descending, not deduplicated)
pub type RetrievedSet = Vec<Document>;

/// A chunk ready to be uploaded to the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Stable identifier (re-indexing overwrites)
    pub id: String,
    /// Chunk text
    pub content: String,
    /// Source path relative to the data directory
    pub title: String,
    /// Embedding of `content`
    pub vector: Vec<f32>,
}
