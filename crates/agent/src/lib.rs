//! The autonomous agent loop for Issola.
//!
//! Each iteration follows a **Prompt → Parse → Dispatch → Record** cycle:
//!
//! 1. **Prompt** the smart model with the persona preamble, the current
//!    time, notes, recalled memories and the conversation so far
//! 2. **Parse** the reply into a [`Decision`](issola_core::Decision),
//!    repairing malformed JSON where possible
//! 3. **Dispatch** the chosen command through the registry
//! 4. **Record** the reply and the command result in bounded memory
//!
//! The loop continues until a terminal command runs, the optional iteration
//! limit is hit, or the operator quits. Research tasks queued by the model
//! are handled concurrently by a [`ResearchWorkerPool`].

pub mod context;
pub mod loop_runner;
pub mod narration;
pub mod prompt;
pub mod repair;
pub mod research;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::ConversationMemory;
pub use loop_runner::{
    AgentLoop, Confirmation, LoopState, Operator, RunSummary, StepReport, StopReason,
    TRIGGER_PROMPT,
};
pub use narration::{LogSpeaker, Narrator, Speaker};
pub use prompt::AiConfig;
pub use repair::{ParseError, ResponseRepairer};
pub use research::{ResearchWorkerPool, Researcher};
