//! Conversation context for the agent loop.
//!
//! [`ConversationMemory`] is the token-budgeted transcript replayed to the
//! model every turn; [`token`] holds the size heuristic it is measured with.

pub mod conversation;
pub mod token;

pub use conversation::ConversationMemory;
