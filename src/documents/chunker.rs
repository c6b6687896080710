//! Recursive-separator chunking with table atomic pass-through (§4.2)

use crate::config::IngestionConfig;
use crate::documents::model::{ContentBlock, ContentType};

/// Separators tried in order, from coarsest to finest, matching a
/// recursive-character splitter's usual paragraph/line/space/char cascade.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A chunk of content prior to being written to the database: everything a
/// `DocumentChunk` needs except its id, document id and embedding.
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    pub content: String,
    pub content_type: ContentType,
    pub is_atomic: bool,
    pub page: usize,
    pub total_pages: usize,
    pub start_index: Option<usize>,
    /// Set when this chunk absorbed one or more undersized neighbors during
    /// `merge_small_chunks`.
    pub merged_small_chunk: bool,
}

/// Splits extracted content blocks into chunks of bounded size, preserving
/// table blocks whole and merging any resulting chunk shorter than
/// `min_standalone_chunk_size` into its predecessor.
pub struct Chunker {
    config: IngestionConfig,
}

impl Chunker {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, blocks: &[ContentBlock]) -> Vec<PreparedChunk> {
        let mut chunks = Vec::new();

        for block in blocks {
            match block.content_type {
                ContentType::Table => {
                    chunks.push(PreparedChunk {
                        content: block.text.clone(),
                        content_type: ContentType::Table,
                        is_atomic: true,
                        page: block.page,
                        total_pages: block.total_pages,
                        start_index: Some(0),
                        merged_small_chunk: false,
                    });
                }
                ContentType::Text => {
                    for (start_index, text) in self.split_recursive(&block.text, 0) {
                        if text.trim().is_empty() {
                            continue;
                        }
                        chunks.push(PreparedChunk {
                            content: text,
                            content_type: ContentType::Text,
                            is_atomic: false,
                            page: block.page,
                            total_pages: block.total_pages,
                            start_index: Some(start_index),
                            merged_small_chunk: false,
                        });
                    }
                }
            }
        }

        self.merge_small_chunks(chunks)
    }

    /// Recursively split text on the coarsest separator that actually
    /// divides it into pieces no larger than `chunk_size`, with `overlap`
    /// characters of context carried from the end of one chunk into the
    /// start of the next. Returns `(start_index, content)` pairs.
    fn split_recursive(&self, text: &str, depth: usize) -> Vec<(usize, String)> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.effective_overlap();

        if text.len() <= chunk_size {
            return vec![(0, text.to_string())];
        }

        let separator = SEPARATORS
            .get(depth)
            .copied()
            .unwrap_or("");

        let pieces: Vec<&str> = if separator.is_empty() {
            // Last resort: hard character split.
            return self.hard_split(text, chunk_size, overlap);
        } else {
            text.split(separator).collect()
        };

        if pieces.len() <= 1 {
            return self.split_recursive(text, depth + 1);
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_start = 0usize;
        let mut cursor = 0usize;

        for (i, piece) in pieces.iter().enumerate() {
            let candidate_len = current.len() + piece.len() + separator.len();
            if !current.is_empty() && candidate_len > chunk_size {
                chunks.push((current_start, std::mem::take(&mut current)));
                let overlap_start = chunks
                    .last()
                    .map(|(_, c): &(usize, String)| c.len().saturating_sub(overlap))
                    .unwrap_or(0);
                let carry = chunks
                    .last()
                    .map(|(_, c)| c[overlap_start..].to_string())
                    .unwrap_or_default();
                current_start = cursor.saturating_sub(carry.len());
                current = carry;
            }
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(piece);
            cursor += piece.len() + separator.len();
            if i == 0 {
                current_start = 0;
            }
        }
        if !current.trim().is_empty() {
            chunks.push((current_start, current));
        }

        chunks
    }

    fn hard_split(&self, text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, String)> {
        let mut chunks = Vec::new();
        let bytes = text.as_bytes();
        let mut start = 0usize;
        while start < bytes.len() {
            let end = (start + chunk_size).min(bytes.len());
            chunks.push((start, text[start..end].to_string()));
            if end == bytes.len() {
                break;
            }
            start += chunk_size.saturating_sub(overlap).max(1);
        }
        chunks
    }

    /// Merge any chunk shorter than `min_standalone_chunk_size` into the
    /// previous chunk on the same page, unless it is an atomic table block.
    fn merge_small_chunks(&self, chunks: Vec<PreparedChunk>) -> Vec<PreparedChunk> {
        let min_size = self.config.min_standalone_chunk_size;
        let mut merged: Vec<PreparedChunk> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            if chunk.is_atomic {
                merged.push(chunk);
                continue;
            }

            if chunk.content.len() < min_size {
                if let Some(prev) = merged.last_mut() {
                    if !prev.is_atomic && prev.page == chunk.page {
                        prev.content.push_str("\n\n");
                        prev.content.push_str(&chunk.content);
                        prev.merged_small_chunk = true;
                        continue;
                    }
                }
            }
            merged.push(chunk);
        }

        merged
    }
}
