//! # Issola Core
//!
//! Domain types, traits, and error definitions for the Issola agent.
//! Every other crate depends inward on this one: the decision format the
//! model must produce, the conversation message type, and the traits behind
//! which the model, command handlers and semantic memory live.
//!
//! ## Design Philosophy
//!
//! External collaborators are traits defined here. Implementations live in
//! their own crates, which keeps them swappable through configuration and
//! replaceable by scripted stubs in tests.

pub mod command;
pub mod decision;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use command::{Command, CommandArgs, CommandName, CommandRegistry, ERROR_PREFIX};
pub use decision::{CommandCall, Decision, Thoughts};
pub use error::{CommandError, Error, MemoryError, ProviderError, Result, StoreError};
pub use memory::MemoryBackend;
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
