//! Terminal node: Fallback — produces the refusal message for whichever of
//! the four short-circuit causes ended the run (§4.8). One node
//! parameterized by cause, rather than a family of near-identical
//! terminal nodes.

use crate::agent::graph::{FallbackCause, GraphContext};
use crate::agent::state::AgentState;
use tracing::warn;

pub async fn run(_ctx: &GraphContext, state: &mut AgentState, cause: FallbackCause) {
    let message = match cause {
        FallbackCause::Malicious => {
            warn!("run terminated: input violated policy");
            "I'm sorry, but I can't help with that request — it violates our usage policies."
        }
        FallbackCause::Risky => {
            warn!("run terminated: output withheld for safety");
            "I can't share that response because it may contain sensitive or private information."
        }
        FallbackCause::Ownership => {
            warn!("run terminated: session ownership violation");
            "Not found or access denied."
        }
        FallbackCause::Generic => {
            warn!("run terminated: insufficient knowledge or transient failure");
            "I don't have enough information in the knowledge base to answer that right now."
        }
    };

    state.final_response = Some(message.to_string());
}
