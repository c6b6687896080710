//! Node 1: Host — entry point, no persistence. Persistence is deferred to
//! Paraphrase so a prompt flagged by InputGuard never touches the chat
//! store.

use crate::agent::graph::GraphContext;
use crate::agent::state::AgentState;
use crate::error::{GraphError, Result};
use tracing::warn;

/// Validate the run's preconditions and, if the caller supplied a
/// `session_id`, load its most recent history into state. The session's
/// ownership check is Paraphrase's responsibility (§4.8): a session this
/// user does not own simply yields no history here rather than failing the
/// whole run, since the policy decision itself belongs downstream.
pub async fn run(ctx: &GraphContext, state: &mut AgentState) -> Result<()> {
    if state.owner_id.trim().is_empty() {
        return Err(GraphError::MissingState {
            node: "Host",
            field: "owner_id",
        }
        .into());
    }
    if state.current_prompt.trim().is_empty() {
        return Err(GraphError::MissingState {
            node: "Host",
            field: "current_prompt",
        }
        .into());
    }

    if let Some(session_id) = state.session_id {
        match ctx.chat_store.history(session_id, ctx.chat_config.chat_message_limit).await {
            Ok(history) => state.history = history,
            Err(e) => {
                warn!(error = %e, "could not load chat history for session, continuing with empty history");
                state.history = Vec::new();
            }
        }
    }

    Ok(())
}
