//! Chat session and message storage (§4.9).

pub mod model;
pub mod store;

pub use model::{ChatMessage, ChatSession, Sender};
pub use store::ChatStore;
