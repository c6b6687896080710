//! The query agent graph: a safety-gated, seven-node pipeline from raw
//! prompt to grounded, screened response (§4.8).
//!
//! Modeled as an explicit, linear Rust state machine rather than a cyclic
//! graph with conditional edges: Host → InputGuard → (malicious? Fallback
//! : Paraphrase) → Retriever → ContextBuilder → OutputGuard → (risky?
//! Fallback : done). Fallback is reached from four distinct causes
//! (malicious input, ownership violation, risky output, generic failure)
//! and always terminates the run.

use crate::agent::nodes::{context_builder, fallback, host, input_guard, output_guard, paraphrase, retriever};
use crate::agent::safety::{InputGuard, OutputGuard};
use crate::agent::state::AgentState;
use crate::chat::store::ChatStore;
use crate::config::{ChatConfig, IngestionConfig, SafetyConfig};
use crate::documents::vector_store::VectorStore;
use crate::error::Result;
use crate::llm::LlmClient;
use std::sync::Arc;

/// Why the graph terminated at Fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCause {
    Malicious,
    Ownership,
    Risky,
    /// Any other recoverable failure during Paraphrase/Retriever/
    /// ContextBuilder (LLM unavailable, persistence failure unrelated to
    /// ownership): surfaced as the generic "insufficient knowledge" refusal
    /// per §7's transient-error-during-query policy.
    Generic,
}

/// Resources shared by every node in one graph run.
pub struct GraphContext {
    pub chat_store: Arc<ChatStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmClient>,
    pub input_guard: InputGuard,
    pub output_guard: OutputGuard,
    pub chat_config: ChatConfig,
    pub ingestion_config: IngestionConfig,
}

impl GraphContext {
    pub fn new(
        chat_store: Arc<ChatStore>,
        vector_store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
        safety_config: &SafetyConfig,
        chat_config: ChatConfig,
        ingestion_config: IngestionConfig,
    ) -> Self {
        Self {
            chat_store,
            vector_store,
            llm,
            input_guard: InputGuard::new(safety_config),
            output_guard: OutputGuard::new(safety_config),
            chat_config,
            ingestion_config,
        }
    }
}

/// The agent graph itself: stateless aside from its shared `GraphContext`,
/// so one instance can drive many concurrent runs, each with its own
/// `AgentState`.
pub struct AgentGraph {
    ctx: Arc<GraphContext>,
}

impl AgentGraph {
    pub fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// Run one query through the full graph, returning the final state.
    /// `AgentGraph::run` itself never returns `Err`: every node error —
    /// whether a precondition failure (Host), a policy decision (malicious
    /// input, ownership, risky output), or a graph-level invariant violation
    /// (a node's required input missing) — is recorded on `AgentState` and
    /// routed to Fallback, per §4.8/§7 ("a missing critical field ... aborts
    /// the run to Fallback"). The `Result` wrapper exists only because the
    /// node functions share the crate's `Result` signature for uniformity.
    pub async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        if let Err(e) = host::run(&self.ctx, &mut state).await {
            state.error_message = Some(e.to_string());
            fallback::run(&self.ctx, &mut state, FallbackCause::Generic).await;
            return Ok(state);
        }

        input_guard::run(&self.ctx, &mut state);
        if state.is_malicious {
            fallback::run(&self.ctx, &mut state, FallbackCause::Malicious).await;
            return Ok(state);
        }

        let cause = match paraphrase::run(&self.ctx, &mut state).await {
            Ok(cause) => cause,
            Err(e) => {
                state.error_message = Some(e.to_string());
                Some(FallbackCause::Generic)
            }
        };
        if let Some(cause) = cause {
            fallback::run(&self.ctx, &mut state, cause).await;
            return Ok(state);
        }

        retriever::run(&self.ctx, &mut state).await;
        let cause = match context_builder::run(&self.ctx, &mut state).await {
            Ok(cause) => cause,
            Err(e) => {
                state.error_message = Some(e.to_string());
                Some(FallbackCause::Generic)
            }
        };
        if let Some(cause) = cause {
            fallback::run(&self.ctx, &mut state, cause).await;
            return Ok(state);
        }

        output_guard::run(&self.ctx, &mut state);
        if state.is_risky {
            fallback::run(&self.ctx, &mut state, FallbackCause::Risky).await;
            return Ok(state);
        }

        state.final_response = state.generated_response.clone();
        if let Some(session_id) = state.session_id {
            if let Some(ref response) = state.final_response {
                if let Err(e) = self
                    .ctx
                    .chat_store
                    .append_assistant_message(session_id, response)
                    .await
                {
                    state.error_message = Some(e.to_string());
                    fallback::run(&self.ctx, &mut state, FallbackCause::Generic).await;
                    return Ok(state);
                }
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_cause_variants_are_distinct() {
        assert_ne!(FallbackCause::Malicious, FallbackCause::Risky);
        assert_ne!(FallbackCause::Malicious, FallbackCause::Ownership);
    }
}
