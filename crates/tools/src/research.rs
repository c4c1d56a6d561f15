//! `queue_research`: hand a topic to the background research workers.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, optional_str, required_str};
use issola_core::error::CommandError;
use issola_memory::{TaskQueue, VisitGuard};
use std::sync::Arc;
use tracing::debug;

pub const ALREADY_QUEUED: &str =
    "This topic has already been researched. Proceed to another topic.";

pub struct QueueResearchCommand {
    queue: Arc<TaskQueue>,
    topics: Arc<VisitGuard>,
}

impl QueueResearchCommand {
    pub fn new(queue: Arc<TaskQueue>, topics: Arc<VisitGuard>) -> Self {
        Self { queue, topics }
    }
}

#[async_trait]
impl Command for QueueResearchCommand {
    fn name(&self) -> &str {
        CommandName::QueueResearch.as_str()
    }

    fn description(&self) -> &str {
        "Queue a topic for background research"
    }

    fn required_args(&self) -> &[&'static str] {
        &["topic"]
    }

    fn optional_args(&self) -> &[&'static str] {
        &["parent"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let topic = required_str(&args, "topic")?;
        let parent = optional_str(&args, "parent")
            .map(|p| {
                p.parse::<u64>().map_err(|_| {
                    CommandError::InvalidArguments(format!("Invalid parent task id '{p}'"))
                })
            })
            .transpose()?;

        let key = topic.trim().to_lowercase();
        if !self.topics.accept(&key).await? {
            debug!(topic = %topic, "Topic already queued");
            return Ok(ALREADY_QUEUED.into());
        }

        let task = self.queue.enqueue(&topic, parent).await?;
        Ok(format!("Research task {} queued: {}", task.id, task.topic))
    }
}
