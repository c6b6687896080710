//! Node 5: ContextBuilder — composes the enriched query from the
//! paraphrased intent and retrieved chunks, then calls the primary
//! generation model (§4.8).

use crate::agent::graph::{FallbackCause, GraphContext};
use crate::agent::state::AgentState;
use crate::error::{GraphError, Result};
use crate::llm::{system_message, user_message};
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the provided context. If the context does not contain enough information to answer the question, say so clearly. Do not fabricate information.";

/// Returns `Ok(Some(FallbackCause::Generic))` when the primary LLM call
/// fails — a transient external-dependency failure during query handling
/// is recovered locally as the generic "insufficient knowledge" refusal
/// rather than aborting the run (§7).
pub async fn run(ctx: &GraphContext, state: &mut AgentState) -> Result<Option<FallbackCause>> {
    let paraphrased = state
        .paraphrased_text
        .clone()
        .ok_or(GraphError::MissingState {
            node: "ContextBuilder",
            field: "paraphrased_text",
        })?;

    let context_section = if state.retrieved_chunks.is_empty() {
        "No relevant context found in the knowledge base.".to_string()
    } else {
        state
            .retrieved_chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Context {}:\n{}", i + 1, chunk))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    };

    let enriched_query = format!(
        "User Question: {paraphrased}\n\nRelevant Context from Knowledge Base:\n{context_section}\n\nPlease provide a comprehensive answer based on the context provided above. If the context does not contain enough information to answer the question, please indicate that clearly."
    );

    let messages = vec![system_message(SYSTEM_PROMPT), user_message(enriched_query.clone())];

    state.enriched_query = Some(enriched_query);

    match ctx.llm.generate(&messages).await {
        Ok(response) => {
            state.primary_response = Some(response.text.clone());
            state.generated_response = Some(response.text);
            Ok(None)
        }
        Err(e) => {
            warn!(error = %e, "primary generation failed");
            state.error_message = Some("could not generate a response".to_string());
            Ok(Some(FallbackCause::Generic))
        }
    }
}
