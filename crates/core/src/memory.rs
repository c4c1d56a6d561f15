//! Semantic memory capability.
//!
//! The agent can store free-text memories and later ask for the ones most
//! relevant to a piece of text. How relevance is computed is up to the
//! backend (keyword overlap, embeddings, an external vector store).

use async_trait::async_trait;
use crate::error::MemoryError;

#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Store a memory. Returns a human-readable confirmation.
    async fn add(&self, text: &str) -> Result<String, MemoryError>;

    /// Return up to `limit` stored memories relevant to `text`, best first.
    async fn get_relevant(&self, text: &str, limit: usize) -> Result<Vec<String>, MemoryError>;

    /// Number of stored memories.
    async fn count(&self) -> Result<usize, MemoryError>;

    /// Forget everything.
    async fn clear(&self) -> Result<(), MemoryError>;
}
