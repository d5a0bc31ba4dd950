//! Conversation memory
//!
//! Caller-side history for a console or web session and the window of it
//! handed to each new query.

pub mod context_manager;
pub mod store;

pub use context_manager::{ContextConfig, ContextManager};
pub use store::{ConversationHistory, ConversationMessage};
