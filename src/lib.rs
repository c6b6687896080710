//! A retrieval-augmented generation backend: a PDF ingestion pipeline and a
//! safety-gated query agent graph over a vector-indexed document corpus.
//!
//! The crate is shared by two binaries (`ingestion-service`,
//! `query-service`): the ingestion service consumes object-store upload
//! events and drives documents through [`documents::pipeline`]; the query
//! service answers prompts by running [`agent::graph::AgentGraph`] against
//! the same indexed corpus and [`chat::store::ChatStore`].

pub mod agent;
pub mod api;
pub mod broker;
pub mod cache;
pub mod chat;
pub mod config;
pub mod documents;
pub mod error;
pub mod llm;
pub mod object_store;

pub use agent::graph::{AgentGraph, FallbackCause, GraphContext};
pub use agent::state::AgentState;
pub use config::AppConfig;
pub use error::{AppError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
