//! Node 6: OutputGuard — PII screening of the generated response (§4.7, §4.8).

use crate::agent::graph::GraphContext;
use crate::agent::safety::SafetyValidator;
use crate::agent::state::AgentState;

pub fn run(ctx: &GraphContext, state: &mut AgentState) {
    let text = state.generated_response.clone().unwrap_or_default();
    let verdict = ctx.output_guard.check_fail_closed(&text);
    state.is_risky = verdict.flagged;
    if verdict.flagged {
        state.error_message = verdict.reason;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::graph::GraphContext;
    use crate::chat::store::ChatStore;
    use crate::config::{ChatConfig, IngestionConfig, SafetyConfig};
    use crate::documents::vector_store::SqliteVectorStore;
    use crate::llm::OllamaClient;
    use sqlx::sqlite::SqlitePool;
    use std::sync::Arc;

    async fn test_ctx() -> GraphContext {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let chat_store = Arc::new(ChatStore::new(pool.clone()));
        chat_store.init_schema().await.unwrap();
        let vector_store = Arc::new(SqliteVectorStore::new(pool, 4));
        let llm = Arc::new(OllamaClient::new(Default::default()));
        GraphContext::new(
            chat_store,
            vector_store,
            llm,
            &SafetyConfig::default(),
            ChatConfig::default(),
            IngestionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_pii_response_is_risky() {
        let ctx = test_ctx().await;
        let mut state = AgentState::new("alice", "irrelevant");
        state.generated_response = Some("Contact me at alice@example.com".to_string());
        run(&ctx, &mut state);
        assert!(state.is_risky);
    }

    #[tokio::test]
    async fn test_clean_response_not_risky() {
        let ctx = test_ctx().await;
        let mut state = AgentState::new("alice", "irrelevant");
        state.generated_response = Some("RAG combines retrieval with generation.".to_string());
        run(&ctx, &mut state);
        assert!(!state.is_risky);
    }
}
