//! Node 3: Paraphrase — atomically persists the user's message, then
//! reformulates the current prompt into exactly three standalone
//! statements to broaden retrieval recall (§4.8).
//!
//! Persistence is deliberately deferred here rather than to Host, so that a
//! prompt InputGuard has already flagged malicious never touches the chat
//! store (§4.8, §8 "safety gating").

use crate::agent::graph::{FallbackCause, GraphContext};
use crate::agent::state::{AgentState, PARAPHRASE_COUNT};
use crate::chat::model::ChatMessage;
use crate::error::Result;
use crate::llm::{system_message, user_message, Message};
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are an expert at paraphrasing user questions to be standalone and clear, given the conversation history. Reformulate the user's intention into exactly three standalone queries that each include any necessary context from previous messages. Do not answer the question, just rewrite it. Respond with a JSON array of exactly three strings and nothing else.";

/// How many of the most recent history messages to include as context when
/// building the paraphrase prompt (§4.8 "last 9 history messages").
const HISTORY_CONTEXT_WINDOW: usize = 9;

/// Persist the message, build the paraphrase prompt, call the LLM, and
/// normalize its response to exactly `PARAPHRASE_COUNT` statements.
///
/// Returns `Ok(Some(cause))` when the run must short-circuit to Fallback
/// (ownership violation or an unrecoverable LLM/persistence failure);
/// `Ok(None)` to continue to Retriever.
pub async fn run(ctx: &GraphContext, state: &mut AgentState) -> Result<Option<FallbackCause>> {
    if let Some(cause) = persist_user_message(ctx, state).await? {
        return Ok(Some(cause));
    }

    let messages = build_prompt(state);
    let raw = match ctx.llm.generate(&messages).await {
        Ok(response) => response.text,
        Err(e) => {
            warn!(error = %e, "paraphrase LLM call failed");
            state.error_message = Some("could not reformulate the request".to_string());
            return Ok(Some(FallbackCause::Generic));
        }
    };

    let statements = normalize_statements(&raw);
    state.paraphrased_text = Some(statements[0].clone());
    state.paraphrased_statements = statements;

    Ok(None)
}

/// Create-or-append the session per §4.8's ownership contract, returning
/// `Some(Ownership)` if the supplied `session_id` is not owned by
/// `owner_id`.
async fn persist_user_message(ctx: &GraphContext, state: &mut AgentState) -> Result<Option<FallbackCause>> {
    match state.session_id {
        Some(session_id) => match ctx.chat_store.check_ownership(session_id, &state.owner_id).await {
            Ok(()) => {
                if let Err(e) = ctx.chat_store.append_user_message(session_id, &state.current_prompt).await {
                    warn!(error = %e, "failed to append user message");
                    state.error_message = Some("could not save your message".to_string());
                    return Ok(Some(FallbackCause::Generic));
                }
                Ok(None)
            }
            Err(_) => {
                state.error_message = Some("not found or access denied".to_string());
                Ok(Some(FallbackCause::Ownership))
            }
        },
        None => match ctx
            .chat_store
            .create_session_with_message(&state.owner_id, &state.current_prompt)
            .await
        {
            Ok((session_id, _message_id)) => {
                state.session_id = Some(session_id);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "failed to create session");
                state.error_message = Some("could not start a new conversation".to_string());
                Ok(Some(FallbackCause::Generic))
            }
        },
    }
}

/// Build the LLM prompt: the last `HISTORY_CONTEXT_WINDOW` history messages
/// as labelled context, plus the newest message as the intention to
/// reformulate.
fn build_prompt(state: &AgentState) -> Vec<Message> {
    let mut body = String::new();

    let start = state.history.len().saturating_sub(HISTORY_CONTEXT_WINDOW);
    for msg in &state.history[start..] {
        body.push_str(&label_for(msg));
        body.push_str(": ");
        body.push_str(&msg.text);
        body.push('\n');
    }

    body.push_str("Intention: ");
    body.push_str(&state.current_prompt);

    vec![system_message(SYSTEM_PROMPT), user_message(body)]
}

fn label_for(msg: &ChatMessage) -> String {
    match crate::chat::model::Sender::parse_or_label(&msg.sender) {
        Ok(sender) => {
            let s = sender.as_str();
            let mut chars = s.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => s.to_string(),
            }
        }
        Err(label) => label,
    }
}

/// Normalize an LLM response into exactly `PARAPHRASE_COUNT` statements:
/// try a strict JSON array parse first, then fall back to splitting on
/// lines; if fewer than `PARAPHRASE_COUNT` results come back, right-pad by
/// repeating the last one (§4.8, §9 "dynamic JSON LLM responses").
fn normalize_statements(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    let mut statements: Vec<String> = serde_json::from_str::<Vec<String>>(trimmed)
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if statements.is_empty() {
        statements = trimmed
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
    }

    if statements.is_empty() {
        statements.push(raw.trim().to_string());
    }

    statements.truncate(PARAPHRASE_COUNT);
    while statements.len() < PARAPHRASE_COUNT {
        let last = statements.last().cloned().unwrap_or_default();
        statements.push(last);
    }

    statements
}
