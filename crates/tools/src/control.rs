//! Loop control: the terminal commands, which stop the agent loop, and
//! `take_break`, which pauses it.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName};
use issola_core::error::CommandError;
use std::time::Duration;
use tracing::info;

pub const SHUTDOWN_MESSAGE: &str = "Shutting down...";
pub const BREAK_OVER: &str = "Break over";

/// `task_complete` and `mark_project_completed`.
pub struct ShutdownCommand {
    name: CommandName,
    description: &'static str,
}

impl ShutdownCommand {
    pub fn task_complete() -> Self {
        Self {
            name: CommandName::TaskComplete,
            description: "Task Complete (Shutdown)",
        }
    }

    pub fn mark_project_completed() -> Self {
        Self {
            name: CommandName::MarkProjectCompleted,
            description: "Mark Project Completed (Shutdown)",
        }
    }
}

#[async_trait]
impl Command for ShutdownCommand {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn description(&self) -> &str {
        self.description
    }

    fn optional_args(&self) -> &[&'static str] {
        &["reason"]
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, _args: CommandArgs) -> Result<String, CommandError> {
        info!(command = %self.name, "Terminal command received");
        Ok(SHUTDOWN_MESSAGE.into())
    }
}

/// `take_break`: sleep for the configured pause, then carry on.
pub struct TakeBreakCommand {
    duration: Duration,
}

impl TakeBreakCommand {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Command for TakeBreakCommand {
    fn name(&self) -> &str {
        CommandName::TakeBreak.as_str()
    }

    fn description(&self) -> &str {
        "Take a break"
    }

    async fn execute(&self, _args: CommandArgs) -> Result<String, CommandError> {
        info!(secs = self.duration.as_secs(), "Taking a break...");
        tokio::time::sleep(self.duration).await;
        Ok(BREAK_OVER.into())
    }
}
