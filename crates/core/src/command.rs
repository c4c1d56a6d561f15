//! Command trait and registry: the agent's fixed capability set.
//!
//! A command is what the model asks for in `command.name`. Each one is a
//! handler with a declared argument contract. The registry is the single
//! boundary where handler outcomes become text for the model:
//!
//! - unknown names produce corrective feedback, never a failure
//! - missing required arguments are reported by name
//! - handler errors (and panics) become strings starting with [`ERROR_PREFIX`]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::CommandError;

/// Marker that starts every error result fed back to the model.
pub const ERROR_PREFIX: &str = "Error: ";

/// Arguments as supplied by the model.
pub type CommandArgs = Map<String, Value>;

/// The closed set of built-in command identifiers.
///
/// Dispatch is exact-match on [`CommandName::as_str`]; no prefix or
/// substring matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Google,
    BrowseWebsite,
    GetTextSummary,
    GetHyperlinks,
    MemoryAdd,
    FetchRelatedMemories,
    StartAgent,
    MessageAgent,
    ListAgents,
    DeleteAgent,
    ReadFile,
    WriteToFile,
    AppendToFile,
    DeleteFile,
    SearchFiles,
    EvaluateCode,
    ImproveCode,
    WriteTests,
    AddValueToKey,
    RemoveValueFromKey,
    GetKeyValue,
    AddItemTo,
    RemoveItemFrom,
    ChangeItem,
    RemoveItem,
    FindItem,
    IncrementItem,
    AskMyself,
    AskUser,
    AddMissionCriticalNotes,
    QueueResearch,
    TakeBreak,
    TaskComplete,
    MarkProjectCompleted,
}

impl CommandName {
    pub const ALL: [CommandName; 34] = [
        CommandName::Google,
        CommandName::BrowseWebsite,
        CommandName::GetTextSummary,
        CommandName::GetHyperlinks,
        CommandName::MemoryAdd,
        CommandName::FetchRelatedMemories,
        CommandName::StartAgent,
        CommandName::MessageAgent,
        CommandName::ListAgents,
        CommandName::DeleteAgent,
        CommandName::ReadFile,
        CommandName::WriteToFile,
        CommandName::AppendToFile,
        CommandName::DeleteFile,
        CommandName::SearchFiles,
        CommandName::EvaluateCode,
        CommandName::ImproveCode,
        CommandName::WriteTests,
        CommandName::AddValueToKey,
        CommandName::RemoveValueFromKey,
        CommandName::GetKeyValue,
        CommandName::AddItemTo,
        CommandName::RemoveItemFrom,
        CommandName::ChangeItem,
        CommandName::RemoveItem,
        CommandName::FindItem,
        CommandName::IncrementItem,
        CommandName::AskMyself,
        CommandName::AskUser,
        CommandName::AddMissionCriticalNotes,
        CommandName::QueueResearch,
        CommandName::TakeBreak,
        CommandName::TaskComplete,
        CommandName::MarkProjectCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Google => "google",
            CommandName::BrowseWebsite => "browse_website",
            CommandName::GetTextSummary => "get_text_summary",
            CommandName::GetHyperlinks => "get_hyperlinks",
            CommandName::MemoryAdd => "memory_add",
            CommandName::FetchRelatedMemories => "fetch_related_memories",
            CommandName::StartAgent => "start_agent",
            CommandName::MessageAgent => "message_agent",
            CommandName::ListAgents => "list_agents",
            CommandName::DeleteAgent => "delete_agent",
            CommandName::ReadFile => "read_file",
            CommandName::WriteToFile => "write_to_file",
            CommandName::AppendToFile => "append_to_file",
            CommandName::DeleteFile => "delete_file",
            CommandName::SearchFiles => "search_files",
            CommandName::EvaluateCode => "evaluate_code",
            CommandName::ImproveCode => "improve_code",
            CommandName::WriteTests => "write_tests",
            CommandName::AddValueToKey => "add_value_to_key",
            CommandName::RemoveValueFromKey => "remove_value_from_key",
            CommandName::GetKeyValue => "get_key_value",
            CommandName::AddItemTo => "add_item_to",
            CommandName::RemoveItemFrom => "remove_item_from",
            CommandName::ChangeItem => "change_item",
            CommandName::RemoveItem => "remove_item",
            CommandName::FindItem => "find_item",
            CommandName::IncrementItem => "increment_item",
            CommandName::AskMyself => "ask_myself",
            CommandName::AskUser => "ask_user",
            CommandName::AddMissionCriticalNotes => "add_mission_critical_notes",
            CommandName::QueueResearch => "queue_research",
            CommandName::TakeBreak => "take_break",
            CommandName::TaskComplete => "task_complete",
            CommandName::MarkProjectCompleted => "mark_project_completed",
        }
    }
}

impl std::fmt::Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CommandError::NotFound(format!("command '{s}'")))
    }
}

/// The core Command trait.
///
/// Handlers return `Result`; converting failures to text is the registry's
/// job, not the handler's.
#[async_trait]
pub trait Command: Send + Sync {
    /// The exact name the model must use.
    fn name(&self) -> &str;

    /// Short label shown in the prompt's command list.
    fn description(&self) -> &str;

    /// Argument keys that must be present before the handler runs.
    fn required_args(&self) -> &[&'static str] {
        &[]
    }

    /// Argument keys the handler understands but does not require.
    fn optional_args(&self) -> &[&'static str] {
        &[]
    }

    /// Whether executing this command ends the agent loop.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Run the command.
    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError>;
}

/// Name → handler mapping with a stable listing order.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
    order: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a command. Replaces any existing command with the same name.
    pub fn register(&mut self, command: Box<dyn Command>) {
        let name = command.name().to_string();
        if !self.commands.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.commands.insert(name, Arc::from(command));
    }

    /// Get a command by name.
    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Whether `name` is registered and ends the loop.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.get(name).is_some_and(|c| c.is_terminal())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Numbered command list for the prompt, e.g.
    /// `1. Google Search: "google", args: "input": "<input>"`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.order.iter().enumerate() {
            let Some(cmd) = self.commands.get(name) else {
                continue;
            };
            let args: Vec<String> = cmd
                .required_args()
                .iter()
                .chain(cmd.optional_args())
                .map(|a| format!("\"{a}\": \"<{a}>\""))
                .collect();
            out.push_str(&format!(
                "{}. {}: \"{}\", args: {}\n",
                i + 1,
                cmd.description(),
                name,
                if args.is_empty() { "\"\"".to_string() } else { args.join(", ") }
            ));
        }
        out
    }

    /// Execute a command by name and render the outcome as text.
    ///
    /// Never fails: every failure mode is a string meant to be replayed to
    /// the model as feedback.
    pub async fn execute(&self, name: &str, args: CommandArgs) -> String {
        let Some(command) = self.commands.get(name) else {
            warn!(command = %name, "Unknown command requested");
            return unknown_command(name);
        };

        if let Some(missing) = command.required_args().iter().find(|k| !args.contains_key(**k)) {
            debug!(command = %name, argument = %missing, "Missing required argument");
            return format!("{ERROR_PREFIX}Missing required argument '{missing}' for command '{name}'");
        }

        let handler = Arc::clone(command);
        match tokio::spawn(async move { handler.execute(args).await }).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(command = %name, error = %e, "Command failed");
                format!("{ERROR_PREFIX}{e}")
            }
            Err(join_error) => {
                warn!(command = %name, error = %join_error, "Command handler aborted");
                format!("{ERROR_PREFIX}command '{name}' panicked")
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Feedback for a command name the registry does not know.
pub fn unknown_command(name: &str) -> String {
    format!(
        "Unknown command '{name}'. Please refer to the 'COMMANDS' list for available commands and only respond in the specified JSON format."
    )
}

/// Fetch a required string argument.
///
/// Numbers and booleans are accepted and rendered as text, since models
/// regularly emit `"key": 3` where a string was asked for.
pub fn required_str(args: &CommandArgs, key: &str) -> Result<String, CommandError> {
    optional_str(args, key)
        .ok_or_else(|| CommandError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Fetch an optional string argument; empty strings count as absent.
pub fn optional_str(args: &CommandArgs, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
