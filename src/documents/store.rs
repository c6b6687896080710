//! Relational storage for `documents` (§6 relational store schema)

use crate::documents::model::Document;
use crate::error::{DocumentError, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                object_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                content_type TEXT NOT NULL,
                is_atomic INTEGER NOT NULL,
                page INTEGER NOT NULL,
                total_pages INTEGER NOT NULL,
                filename TEXT NOT NULL,
                start_index INTEGER,
                merged_small_chunk INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(document_id, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a document row, returning its new id.
    pub async fn create(&self, filename: &str, object_path: &str) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO documents (filename, object_path, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(filename)
        .bind(object_path)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Document> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DocumentError::NotFound(id))?;

        Self::row_to_document(&row)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Document>, i64)> {
        let rows = sqlx::query(
            "SELECT * FROM documents ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_row = sqlx::query("SELECT COUNT(*) as count FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = total_row.get("count");

        let documents = rows
            .iter()
            .map(Self::row_to_document)
            .collect::<Result<Vec<_>>>()?;

        Ok((documents, total))
    }

    /// Delete a document; its chunks cascade via the foreign key.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DocumentError::NotFound(id).into());
        }
        Ok(())
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
        let created_at_raw: String = row.get("created_at");
        Ok(Document {
            id: row.get("id"),
            filename: row.get("filename"),
            object_path: row.get("object_path"),
            created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
