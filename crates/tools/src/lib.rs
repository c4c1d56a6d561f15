//! Built-in command implementations for Issola.
//!
//! Commands give the agent its fixed capability set: web search and
//! browsing, workspace files, code review by the fast model, semantic
//! memory, the collection store, sub-agents, questions to the model or the
//! user, notes, the research queue, breaks and the terminal commands.
//!
//! Every handler receives its collaborators explicitly through
//! [`CommandDeps`]; nothing here is global.

pub mod agents;
pub mod browse;
pub mod code;
pub mod collection;
pub mod control;
pub mod files;
pub mod memory;
pub mod notes;
pub mod reflect;
pub mod research;
pub mod search;
pub mod web;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

use issola_core::command::CommandRegistry;
use issola_core::memory::MemoryBackend;
use issola_core::provider::Provider;
use issola_memory::{CollectionStore, TaskQueue, VisitGuard};
use std::sync::Arc;
use std::time::Duration;

pub use agents::AgentManager;
pub use browse::{PageReader, ResearchLog};
pub use notes::TaskNotes;
pub use reflect::UserChannel;
pub use search::{HttpSearchEngine, SearchEngine};
pub use web::{HttpWebClient, Summarizer, WebClient};
pub use workspace::Workspace;

/// Everything the built-in commands need, wired once at startup.
pub struct CommandDeps {
    /// Fast-model provider for summaries, sub-agents and `ask_myself`
    pub provider: Arc<dyn Provider>,
    pub fast_model: String,
    pub web: Arc<dyn WebClient>,
    pub search: Arc<dyn SearchEngine>,
    pub search_results: usize,
    pub workspace: Workspace,
    /// URLs already browsed
    pub visited: Arc<VisitGuard>,
    /// Topics already queued for research
    pub topics: Arc<VisitGuard>,
    pub research_log: Arc<ResearchLog>,
    pub collection: Arc<CollectionStore>,
    pub tasks: Arc<TaskQueue>,
    pub memory: Arc<dyn MemoryBackend>,
    pub recall_limit: usize,
    pub notes: TaskNotes,
    /// Answers `ask_user`
    pub user: Arc<dyn UserChannel>,
    /// How long `take_break` sleeps
    pub break_duration: Duration,
}

/// Create the registry with every built-in command, in prompt order.
pub fn default_registry(deps: &CommandDeps) -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    let summarizer = Summarizer::new(Arc::clone(&deps.provider), deps.fast_model.clone());
    let reader = Arc::new(PageReader::new(
        Arc::clone(&deps.web),
        summarizer,
        Arc::clone(&deps.research_log),
    ));
    let agents = Arc::new(AgentManager::new(
        Arc::clone(&deps.provider),
        deps.fast_model.clone(),
    ));

    registry.register(Box::new(search::GoogleCommand::new(
        Arc::clone(&deps.search),
        Arc::clone(&deps.visited),
        deps.search_results,
    )));
    registry.register(Box::new(browse::BrowseWebsiteCommand::new(
        Arc::clone(&reader),
        Arc::clone(&deps.visited),
    )));
    registry.register(Box::new(browse::GetTextSummaryCommand::new(reader)));
    registry.register(Box::new(browse::GetHyperlinksCommand::new(Arc::clone(&deps.web))));

    registry.register(Box::new(memory::MemoryAddCommand::new(Arc::clone(&deps.memory))));
    registry.register(Box::new(memory::FetchRelatedMemoriesCommand::new(
        Arc::clone(&deps.memory),
        deps.recall_limit,
    )));

    registry.register(Box::new(agents::StartAgentCommand::new(Arc::clone(&agents))));
    registry.register(Box::new(agents::MessageAgentCommand::new(Arc::clone(&agents))));
    registry.register(Box::new(agents::ListAgentsCommand::new(Arc::clone(&agents))));
    registry.register(Box::new(agents::DeleteAgentCommand::new(agents)));

    registry.register(Box::new(files::ReadFileCommand::new(deps.workspace.clone())));
    registry.register(Box::new(files::WriteToFileCommand::new(deps.workspace.clone())));
    registry.register(Box::new(files::AppendToFileCommand::new(deps.workspace.clone())));
    registry.register(Box::new(files::DeleteFileCommand::new(deps.workspace.clone())));
    registry.register(Box::new(files::SearchFilesCommand::new(deps.workspace.clone())));

    for cmd in code::CodeCommand::all(Arc::clone(&deps.provider), &deps.fast_model) {
        registry.register(Box::new(cmd));
    }

    for cmd in collection::CollectionCommand::all(Arc::clone(&deps.collection)) {
        registry.register(Box::new(cmd));
    }

    registry.register(Box::new(reflect::AskMyselfCommand::new(
        Arc::clone(&deps.provider),
        deps.fast_model.clone(),
    )));
    registry.register(Box::new(reflect::AskUserCommand::new(
        Arc::clone(&deps.provider),
        deps.fast_model.clone(),
        Arc::clone(&deps.user),
    )));
    registry.register(Box::new(notes::AddMissionCriticalNotesCommand::new(
        deps.notes.clone(),
    )));
    registry.register(Box::new(research::QueueResearchCommand::new(
        Arc::clone(&deps.tasks),
        Arc::clone(&deps.topics),
    )));
    registry.register(Box::new(control::TakeBreakCommand::new(deps.break_duration)));
    registry.register(Box::new(control::ShutdownCommand::task_complete()));
    registry.register(Box::new(control::ShutdownCommand::mark_project_completed()));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoProvider, StaticWeb};
    use async_trait::async_trait;
    use issola_core::command::{CommandArgs, CommandName};
    use issola_core::error::CommandError;
    use issola_memory::InMemoryBackend;
    use serde_json::json;

    struct NoSearch;

    struct SilentUser;

    #[async_trait]
    impl UserChannel for SilentUser {
        async fn ask(&self, _prompt: &str) -> Option<String> {
            None
        }
    }

    #[async_trait]
    impl SearchEngine for NoSearch {
        async fn search(&self, _q: &str, _n: usize) -> Result<Vec<String>, CommandError> {
            Ok(vec!["https://a.example".into()])
        }
    }

    fn deps(workspace: Workspace) -> CommandDeps {
        CommandDeps {
            provider: Arc::new(EchoProvider::new("- summary")),
            fast_model: "gpt-3.5-turbo".into(),
            web: Arc::new(StaticWeb::page("page text")),
            search: Arc::new(NoSearch),
            search_results: 3,
            workspace,
            visited: Arc::new(VisitGuard::ephemeral()),
            topics: Arc::new(VisitGuard::ephemeral()),
            research_log: Arc::new(ResearchLog::ephemeral()),
            collection: Arc::new(CollectionStore::ephemeral()),
            tasks: Arc::new(TaskQueue::ephemeral()),
            memory: Arc::new(InMemoryBackend::new()),
            recall_limit: 5,
            notes: TaskNotes::new(),
            user: Arc::new(SilentUser),
            break_duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn registry_holds_the_closed_command_set_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(&deps(Workspace::open(dir.path()).unwrap()));
        let expected: Vec<&str> = CommandName::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(registry.names(), expected);
    }

    #[test]
    fn only_shutdown_commands_are_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(&deps(Workspace::open(dir.path()).unwrap()));
        let terminal: Vec<&str> = registry
            .names()
            .into_iter()
            .filter(|n| registry.is_terminal(n))
            .collect();
        assert_eq!(terminal, vec!["task_complete", "mark_project_completed"]);
    }

    #[tokio::test]
    async fn search_then_browse_scrubs_the_visited_url() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(&deps(Workspace::open(dir.path()).unwrap()));
        let input = |v: serde_json::Value| -> CommandArgs { v.as_object().cloned().unwrap() };

        let found = registry.execute("google", input(json!({"input": "rust"}))).await;
        assert_eq!(found, r#"["https://a.example"]"#);

        let page = registry
            .execute("browse_website", input(json!({"url": "https://a.example"})))
            .await;
        assert_eq!(page, "Website Content Summary: - summary");

        let found = registry.execute("google", input(json!({"input": "rust"}))).await;
        assert_eq!(found, "[]");
    }
}
