//! In-memory per-run agent state (§3)

use crate::chat::model::ChatMessage;
use uuid::Uuid;

/// Exactly the number of paraphrased statements Parafraseo is expected to
/// produce, and the number of top-K chunks Retriever fetches per statement.
pub const PARAPHRASE_COUNT: usize = 3;
pub const TOP_K_PER_STATEMENT: usize = 3;

/// State threaded through the agent graph's nodes for one query run. Not
/// persisted as a whole: only the chat messages it produces are written to
/// the chat store.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// The session this run belongs to, set by Host (existing session) or
    /// Paraphrase (newly created session).
    pub session_id: Option<Uuid>,

    /// The user who issued this query; every downstream persistence and
    /// retrieval operation is scoped to this owner.
    pub owner_id: String,

    /// The raw user prompt for this run.
    pub current_prompt: String,

    /// Chat history loaded for this session, bounded to `chat_message_limit`
    /// (N_hist), oldest first.
    pub history: Vec<ChatMessage>,

    /// Set by InputGuard; once true, no further persistence or retrieval
    /// side effects may occur and the graph must terminate at Fallback.
    pub is_malicious: bool,

    /// Set by OutputGuard; once true, the graph must terminate at Fallback
    /// instead of returning the generated response.
    pub is_risky: bool,

    /// Set by any node that wants to short-circuit to Fallback with an
    /// explanation (ownership violation, missing chat history, etc).
    pub error_message: Option<String>,

    /// Exactly `PARAPHRASE_COUNT` reformulations of the current prompt,
    /// produced by Paraphrase.
    pub paraphrased_statements: Vec<String>,

    /// The first of `paraphrased_statements`, used by ContextBuilder as the
    /// question restated in the enriched prompt.
    pub paraphrased_text: Option<String>,

    /// Deduplicated chunk texts retrieved across all paraphrased statements.
    pub retrieved_chunks: Vec<String>,

    /// The prompt ContextBuilder actually sent to the generation model.
    pub enriched_query: Option<String>,

    /// Raw text returned by the generation model.
    pub primary_response: Option<String>,

    /// `primary_response`, mirrored for OutputGuard to validate.
    pub generated_response: Option<String>,

    /// The response ultimately returned to the caller: either
    /// `generated_response` (on success) or a Fallback refusal message.
    pub final_response: Option<String>,
}

impl AgentState {
    pub fn new(owner_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            current_prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Whether the graph must terminate at Fallback rather than proceed.
    pub fn is_flagged(&self) -> bool {
        self.is_malicious || self.is_risky
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_not_flagged() {
        let state = AgentState::new("alice", "hello");
        assert!(!state.is_flagged());
    }

    #[test]
    fn test_malicious_flag_marks_flagged() {
        let mut state = AgentState::new("alice", "hello");
        state.is_malicious = true;
        assert!(state.is_flagged());
    }
}
