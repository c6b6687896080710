//! The seven agent graph nodes (§4.8), one module each.

pub mod context_builder;
pub mod fallback;
pub mod host;
pub mod input_guard;
pub mod output_guard;
pub mod paraphrase;
pub mod retriever;
