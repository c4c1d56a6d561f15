//! In-memory backend: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use issola_core::error::MemoryError;
use issola_core::memory::MemoryBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::scoring;

/// One stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Best `limit` records for `text`, most relevant first.
pub(crate) fn relevant(records: &[MemoryRecord], text: &str, limit: usize) -> Vec<String> {
    scoring::rank(text, records.iter().map(|r| r.content.as_str()), limit)
        .into_iter()
        .map(|i| records[i].content.clone())
        .collect()
}

/// An in-memory backend that stores memories in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryBackend {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(&self, text: &str) -> Result<String, MemoryError> {
        let record = MemoryRecord::new(text);
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(format!("Committing memory with string \"{text}\" (id {id})"))
    }

    async fn get_relevant(&self, text: &str, limit: usize) -> Result<Vec<String>, MemoryError> {
        Ok(relevant(&self.records.read().await, text, limit))
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.records.write().await.clear();
        Ok(())
    }
}
