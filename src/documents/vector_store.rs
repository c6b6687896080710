//! Vector-indexed storage for document chunks (§4.3, §6)
//!
//! SQLite has no native vector type, so embeddings are stored as
//! little-endian `f32` BLOBs and similarity search is a brute-force cosine
//! scan over the whole table.

use crate::documents::model::{ContentType, DocumentChunk};
use crate::error::{DocumentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

/// A chunk together with its similarity score against a query embedding.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

/// Storage and similarity search over the `document_chunks` vector
/// collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a batch of chunks belonging to one document. The
    /// whole batch succeeds or fails together (§4.3 document-wide
    /// atomicity): callers must treat a failure as "none of this batch was
    /// written" and roll the document back.
    async fn add_chunks(&self, document_id: i64, chunks: &[DocumentChunk]) -> Result<()>;

    /// Remove every chunk belonging to a document (used by reprocessing).
    async fn delete_by_document(&self, document_id: i64) -> Result<()>;

    /// Cosine-similarity search over the whole collection, returning the
    /// top `limit` results.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;
}

pub fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn deserialize_embedding(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// SQLite-backed implementation of [`VectorStore`], operating on the
/// `document_chunks` table (§6 relational store schema).
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedding_dimension: usize,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedding_dimension: usize) -> Self {
        Self {
            pool,
            embedding_dimension,
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentChunk> {
        let created_at_raw: String = row.get("created_at");
        Ok(DocumentChunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
            content: row.get("content"),
            embedding: deserialize_embedding(&row.get::<Vec<u8>, _>("embedding")),
            content_type: ContentType::from_str(row.get::<String, _>("content_type").as_str()),
            is_atomic: row.get::<i64, _>("is_atomic") != 0,
            page: row.get::<i64, _>("page") as usize,
            total_pages: row.get::<i64, _>("total_pages") as usize,
            filename: row.get("filename"),
            start_index: row
                .get::<Option<i64>, _>("start_index")
                .map(|v| v as usize),
            merged_small_chunk: row.get::<i64, _>("merged_small_chunk") != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_chunks(&self, document_id: i64, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            if chunk.embedding.len() != self.embedding_dimension {
                tx.rollback().await.ok();
                return Err(DocumentError::DimensionMismatch {
                    expected: self.embedding_dimension,
                    actual: chunk.embedding.len(),
                }
                .into());
            }

            let embedding_blob = serialize_embedding(&chunk.embedding);
            let insert = sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (document_id, chunk_index, content, embedding, content_type,
                     is_atomic, page, total_pages, filename, start_index,
                     merged_small_chunk, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&embedding_blob)
            .bind(chunk.content_type.as_str())
            .bind(chunk.is_atomic as i64)
            .bind(chunk.page as i64)
            .bind(chunk.total_pages as i64)
            .bind(&chunk.filename)
            .bind(chunk.start_index.map(|v| v as i64))
            .bind(chunk.merged_small_chunk as i64)
            .bind(chunk.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await;

            if let Err(e) = insert {
                tx.rollback().await.ok();
                return Err(DocumentError::IndexWriteFailed(e.to_string()).into());
            }
        }

        tx.commit().await.map_err(|e| DocumentError::IndexWriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_document(&self, document_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if query_embedding.len() != self.embedding_dimension {
            return Err(DocumentError::DimensionMismatch {
                expected: self.embedding_dimension,
                actual: query_embedding.len(),
            }
            .into());
        }

        let rows = sqlx::query("SELECT * FROM document_chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk = Self::row_to_chunk(row)?;
            let similarity = cosine_similarity(query_embedding, &chunk.embedding);
            scored.push(ScoredChunk { chunk, similarity });
        }

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count") as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_serialization_round_trip() {
        let embedding = vec![1.5_f32, -2.0, 0.0, 3.25];
        let blob = serialize_embedding(&embedding);
        let restored = deserialize_embedding(&blob);
        assert_eq!(embedding, restored);
    }

    #[test]
    fn test_cosine_similarity_identical_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
