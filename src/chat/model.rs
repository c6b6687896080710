//! Data model for chat sessions and messages (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A chat session, exclusively owned by the user who created it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Who sent a given message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }

    /// Parse a stored sender label, degrading any unrecognized value to a
    /// capitalized label rather than failing — see the sender enum drift
    /// design note: an older schema version could persist a sender value
    /// this build doesn't know about.
    pub fn parse_or_label(raw: &str) -> Result<Self, String> {
        match raw {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            "system" => Ok(Sender::System),
            other => Err(capitalize(other)),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A chat message, totally ordered within a session by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: Uuid,
    /// The raw sender label as stored; use [`Sender::parse_or_label`] to
    /// interpret it.
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
