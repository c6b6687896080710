//! Data model for documents and their chunks (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A document ingested from the object store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    /// Object-store key, e.g. `uploads/<uuid>.pdf`
    pub object_path: String,
    pub created_at: DateTime<Utc>,
}

/// Whether a chunk's content is ordinary prose or an atomic table block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Table,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Table => "table",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "table" => ContentType::Table,
            _ => ContentType::Text,
        }
    }
}

/// A chunk of a document, carrying both its text and its embedding.
///
/// `chunk_index` is unique within a document. `is_atomic` chunks (tables)
/// are never split or merged by the chunker.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: usize,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub content_type: ContentType,
    pub is_atomic: bool,
    pub page: usize,
    pub total_pages: usize,
    pub filename: String,
    /// Offset of this chunk's content within its page's extracted text.
    /// Atomic table chunks always record `Some(0)`.
    pub start_index: Option<usize>,
    /// Set when this chunk absorbed one or more undersized neighbors during
    /// `merge_small_chunks`.
    pub merged_small_chunk: bool,
    pub created_at: DateTime<Utc>,
}

/// A piece of extracted document content, prior to chunking: either plain
/// text or an atomic table rendered as Markdown.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    pub content_type: ContentType,
    pub text: String,
    pub page: usize,
    pub total_pages: usize,
    /// Cumulative line offset at which this block starts on its page,
    /// preserving top-to-bottom order in the absence of real PDF
    /// bounding-box coordinates.
    pub y_position: f32,
    /// Lead-in text preceding a table, kept separate from `text` so a
    /// table block's `text` is always exactly its rendered Markdown.
    /// `None` for text blocks.
    pub context: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_round_trip() {
        assert_eq!(ContentType::from_str(ContentType::Table.as_str()), ContentType::Table);
        assert_eq!(ContentType::from_str(ContentType::Text.as_str()), ContentType::Text);
        assert_eq!(ContentType::from_str("unknown"), ContentType::Text);
    }
}
