//! Default command: wire the stores, commands and loop, then run until
//! the agent shuts itself down.

use issola_agent::{
    AgentLoop, AiConfig, LogSpeaker, Narrator, ResearchWorkerPool, Researcher, ResponseRepairer,
    narration::DEFAULT_QUEUE,
};
use issola_config::AppConfig;
use issola_core::command::CommandRegistry;
use issola_core::memory::MemoryBackend;
use issola_memory::{CollectionStore, FileBackend, TaskQueue, VisitGuard};
use issola_tools::{
    CommandDeps, HttpSearchEngine, HttpWebClient, PageReader, ResearchLog, Summarizer, TaskNotes,
    Workspace, default_registry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::operator::StdinOperator;

/// Command-line choices layered over the config file.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub continuous: bool,
    pub speak: bool,
    pub debug: bool,
    pub gpt3only: bool,
    pub max_iterations: Option<u32>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub goals: Vec<String>,
    pub research_workers: Option<usize>,
}

impl RunOptions {
    fn apply(self, config: &mut AppConfig) {
        let agent = &mut config.agent;
        agent.continuous |= self.continuous;
        agent.speak |= self.speak;
        agent.debug |= self.debug;
        if self.max_iterations.is_some() {
            agent.max_iterations = self.max_iterations;
        }
        if let Some(name) = self.name {
            agent.name = name;
        }
        if let Some(role) = self.role {
            agent.role = role;
        }
        if !self.goals.is_empty() {
            agent.goals = self.goals;
        }
        if let Some(workers) = self.research_workers {
            config.research.workers = workers;
        }
        if self.gpt3only {
            config.smart_model = config.fast_model.clone();
        }
    }
}

pub async fn run(mut config: AppConfig, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    options.apply(&mut config);
    config.validate()?;

    if config.agent.continuous {
        warn!("Continuous mode: commands run without authorisation. Use at your own risk.");
    }
    if config.smart_model == config.fast_model {
        info!(model = %config.fast_model, "Using the fast model for every call");
    }

    let provider = issola_providers::build_from_config(&config)
        .map_err(|e| format!("Failed to build provider: {e}"))?;

    // --- Durable stores ---
    let storage = &config.storage;
    let visited = Arc::new(VisitGuard::open(storage.resolve(&storage.visited_file)));
    let topics = Arc::new(VisitGuard::open(storage.resolve(&storage.topics_file)));
    let collection = Arc::new(CollectionStore::open(storage.resolve(&storage.collection_file)));
    let tasks = Arc::new(TaskQueue::open(storage.resolve(&storage.tasks_file)));
    let research_log = Arc::new(ResearchLog::open(storage.resolve(&storage.research_log)).await?);
    let memory: Arc<dyn MemoryBackend> =
        Arc::new(FileBackend::new(storage.resolve(&storage.memory_file)));
    let workspace = Workspace::open(storage.resolve(&storage.workspace))?;

    // --- Commands ---
    let web = Arc::new(HttpWebClient::new(Duration::from_secs(
        config.retry.request_timeout_secs,
    )));
    let search = Arc::new(HttpSearchEngine::from_config(&config.search));
    let notes = TaskNotes::new();
    let terminal = Arc::new(StdinOperator::new(&config.agent.name));
    let deps = CommandDeps {
        provider: Arc::clone(&provider),
        fast_model: config.fast_model.clone(),
        web: web.clone(),
        search: search.clone(),
        search_results: config.search.num_results,
        workspace,
        visited: Arc::clone(&visited),
        topics,
        research_log: Arc::clone(&research_log),
        collection,
        tasks: Arc::clone(&tasks),
        memory: Arc::clone(&memory),
        recall_limit: config.agent.recall_limit,
        notes: notes.clone(),
        user: terminal.clone(),
        break_duration: Duration::from_secs(config.agent.break_secs),
    };
    let registry: Arc<CommandRegistry> = Arc::new(default_registry(&deps));
    let commands = registry.describe();
    info!(commands = registry.names().len(), "Command registry ready");

    // --- Research workers ---
    let pool = (config.research.workers > 0).then(|| {
        let reader = Arc::new(PageReader::new(
            web,
            Summarizer::new(Arc::clone(&provider), config.fast_model.clone()),
            research_log,
        ));
        let researcher = Arc::new(Researcher::new(
            search,
            reader,
            Arc::clone(&visited),
            config.search.num_results,
        ));
        ResearchWorkerPool::start(
            tasks,
            researcher,
            config.research.workers,
            Duration::from_millis(config.research.poll_interval_ms),
        )
    });

    // --- Agent ---
    let persona = AiConfig::from_settings(&config.agent);
    let preamble = persona.construct_prompt(&commands);

    let mut repairer = ResponseRepairer::new().with_commands(commands);
    if config.agent.repair_with_model {
        repairer = repairer.with_model(Arc::clone(&provider), config.fast_model.clone());
    }

    let mut agent = AgentLoop::new(
        provider,
        config.smart_model.clone(),
        registry,
        preamble,
        config.agent.memory_budget_tokens,
    )
    .with_temperature(config.temperature)
    .with_max_tokens(config.max_tokens)
    .with_repairer(repairer)
    .with_semantic_memory(memory, config.agent.recall_limit)
    .with_notes(notes)
    .with_max_iterations(config.agent.max_iterations);

    if !config.agent.continuous {
        agent = agent.with_operator(terminal);
    }
    if config.agent.speak {
        agent = agent.with_narrator(Narrator::spawn(Arc::new(LogSpeaker), DEFAULT_QUEUE));
    }

    info!(
        name = %persona.name,
        model = %config.smart_model,
        goals = persona.goals.len(),
        "Starting agent"
    );

    let outcome = agent.run().await;
    agent.shutdown().await;
    if let Some(pool) = pool {
        pool.shutdown().await;
    }

    let summary = outcome?;
    info!(
        iterations = summary.iterations,
        reason = ?summary.stop_reason,
        "Agent stopped"
    );
    Ok(())
}
