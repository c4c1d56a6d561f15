//! Semantic memory commands.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use issola_core::memory::MemoryBackend;
use std::sync::Arc;

pub struct MemoryAddCommand {
    memory: Arc<dyn MemoryBackend>,
}

impl MemoryAddCommand {
    pub fn new(memory: Arc<dyn MemoryBackend>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Command for MemoryAddCommand {
    fn name(&self) -> &str {
        CommandName::MemoryAdd.as_str()
    }

    fn description(&self) -> &str {
        "Memory Add"
    }

    fn required_args(&self) -> &[&'static str] {
        &["string"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let text = required_str(&args, "string")?;
        Ok(self.memory.add(&text).await?)
    }
}

pub struct FetchRelatedMemoriesCommand {
    memory: Arc<dyn MemoryBackend>,
    limit: usize,
}

impl FetchRelatedMemoriesCommand {
    pub fn new(memory: Arc<dyn MemoryBackend>, limit: usize) -> Self {
        Self { memory, limit }
    }
}

#[async_trait]
impl Command for FetchRelatedMemoriesCommand {
    fn name(&self) -> &str {
        CommandName::FetchRelatedMemories.as_str()
    }

    fn description(&self) -> &str {
        "Fetch Related Memories"
    }

    fn required_args(&self) -> &[&'static str] {
        &["string"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let text = required_str(&args, "string")?;
        let found = self.memory.get_relevant(&text, self.limit).await?;
        if found.is_empty() {
            return Ok("No related memories found.".into());
        }
        serde_json::to_string(&found).map_err(|e| CommandError::ExecutionFailed {
            command: "fetch_related_memories".into(),
            reason: e.to_string(),
        })
    }
}
