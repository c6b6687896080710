//! Chat session and message persistence, with ownership enforcement (§4.9)

use crate::chat::model::{ChatMessage, ChatSession, Sender};
use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a new session owned by `owner_id`, then append the given
    /// user message to it in one transaction — the atomic session-create +
    /// append operation Paraphrase performs for a fresh conversation.
    pub async fn create_session_with_message(
        &self,
        owner_id: &str,
        text: &str,
    ) -> Result<(Uuid, i64)> {
        if owner_id.is_empty() {
            return Err(ChatError::EmptyOwner.into());
        }

        let mut tx = self.pool.begin().await?;
        let session_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO chat_sessions (id, owner_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(session_id.to_string())
            .bind(owner_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?;

        let message_id = Self::insert_message_tx(&mut tx, session_id, Sender::User, text).await?;

        tx.commit()
            .await
            .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?;

        Ok((session_id, message_id))
    }

    /// Append a user message to an existing session the caller already
    /// owns. Ownership must be checked by the caller via [`Self::owner_of`]
    /// before calling this.
    pub async fn append_user_message(&self, session_id: Uuid, text: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = Self::insert_message_tx(&mut tx, session_id, Sender::User, text).await?;
        tx.commit()
            .await
            .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?;
        Ok(id)
    }

    /// Append the assistant's reply to a session.
    pub async fn append_assistant_message(&self, session_id: Uuid, text: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = Self::insert_message_tx(&mut tx, session_id, Sender::Assistant, text).await?;
        tx.commit()
            .await
            .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?;
        Ok(id)
    }

    async fn insert_message_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        session_id: Uuid,
        sender: Sender,
        text: &str,
    ) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO chat_messages (session_id, sender, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id.to_string())
        .bind(sender.as_str())
        .bind(text)
        .bind(now.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// The owning user id of a session, or `NotFoundOrAccessDenied` if the
    /// session does not exist.
    pub async fn owner_of(&self, session_id: Uuid) -> Result<String> {
        let row = sqlx::query("SELECT owner_id FROM chat_sessions WHERE id = ?1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ChatError::NotFoundOrAccessDenied)?;
        Ok(row.get("owner_id"))
    }

    /// Verify that `owner_id` owns `session_id`, returning
    /// `NotFoundOrAccessDenied` for both a missing session and a
    /// cross-session access attempt — the caller cannot distinguish the two
    /// from the error alone, matching the ownership invariant's intent of
    /// not leaking whether a session exists to a non-owner.
    pub async fn check_ownership(&self, session_id: Uuid, owner_id: &str) -> Result<()> {
        let actual_owner = self.owner_of(session_id).await?;
        if actual_owner != owner_id {
            return Err(ChatError::NotFoundOrAccessDenied.into());
        }
        Ok(())
    }

    /// Retrieve up to `limit` most recent messages for a session, ordered
    /// oldest-first: the store itself fetches the newest `limit` rows then
    /// reverses them.
    pub async fn history(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE session_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(session_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ChatMessage> = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage> {
        let session_id_raw: String = row.get("session_id");
        let created_at_raw: String = row.get("created_at");
        Ok(ChatMessage {
            id: row.get("id"),
            session_id: Uuid::parse_str(&session_id_raw)
                .map_err(|e| ChatError::PersistenceFailed(e.to_string()))?,
            sender: row.get("sender"),
            text: row.get("message"),
            created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<ChatSession> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ChatError::NotFoundOrAccessDenied)?;

        let created_at_raw: String = row.get("created_at");
        Ok(ChatSession {
            id: session_id,
            owner_id: row.get("owner_id"),
            created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
