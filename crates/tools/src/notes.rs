//! Mission-critical notes, kept by the model and shown in every prompt.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Notes the model wants to keep in view for the rest of the run.
#[derive(Clone, Default)]
pub struct TaskNotes {
    notes: Arc<RwLock<Vec<String>>>,
}

impl TaskNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, note: impl Into<String>) {
        self.notes.write().await.push(note.into());
    }

    /// Bullet list for the prompt, or `None` when there are no notes.
    pub async fn render(&self) -> Option<String> {
        let notes = self.notes.read().await;
        if notes.is_empty() {
            return None;
        }
        Some(
            notes
                .iter()
                .map(|n| format!("- {n}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct AddMissionCriticalNotesCommand {
    notes: TaskNotes,
}

impl AddMissionCriticalNotesCommand {
    pub fn new(notes: TaskNotes) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Command for AddMissionCriticalNotesCommand {
    fn name(&self) -> &str {
        CommandName::AddMissionCriticalNotes.as_str()
    }

    fn description(&self) -> &str {
        "Add Mission Critical Notes Regarding the Current Task"
    }

    fn required_args(&self) -> &[&'static str] {
        &["notes"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let note = required_str(&args, "notes")?;
        self.notes.add(note).await;
        Ok(format!("Notes saved ({} total).", self.notes.len().await))
    }
}
