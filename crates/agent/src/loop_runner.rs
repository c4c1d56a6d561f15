//! The agent reasoning loop implementation.
//!
//! One decision is in flight at a time. Each [`AgentLoop::step`] walks
//! `AwaitingModel → Parsing → Dispatching → Recording` and either returns to
//! `AwaitingModel` or ends in `Stopped` after a terminal command.

use async_trait::async_trait;
use chrono::Local;
use issola_core::command::{CommandRegistry, ERROR_PREFIX};
use issola_core::decision::{Decision, Thoughts};
use issola_core::error::{Error, ProviderError};
use issola_core::memory::MemoryBackend;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use issola_tools::TaskNotes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ConversationMemory;
use crate::narration::Narrator;
use crate::repair::ResponseRepairer;

/// The per-turn instruction sent after the conversation snapshot.
pub const TRIGGER_PROMPT: &str =
    "Determine which next command to use, and respond using the format specified above:";

/// How many recent messages are used to look up related memories.
const RECALL_WINDOW: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    Parsing,
    Dispatching,
    Recording,
    Stopped,
}

/// The operator's answer when asked to authorise a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Approve,
    /// Approve this command and the next `n` without asking.
    ApproveMany(u32),
    /// Skip the command; the feedback is recorded as its result.
    Reject(String),
    Quit,
}

/// Human in the loop, consulted before each command outside continuous mode.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn confirm(&self, decision: &Decision) -> Confirmation;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A terminal command ran; carries its name.
    TerminalCommand(String),
    IterationLimit,
    OperatorQuit,
}

/// What happened during one iteration.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub iteration: u32,
    /// The model's reply, verbatim.
    pub reply: String,
    /// `None` when the reply could not be parsed.
    pub decision: Option<Decision>,
    /// The result text recorded for this turn.
    pub result: String,
    pub stop: Option<StopReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u32,
    pub stop_reason: StopReason,
}

enum Gate {
    Proceed,
    Feedback(String),
    Quit,
}

/// The core agent loop that drives the model through the command set.
pub struct AgentLoop {
    /// Smart-model provider
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,

    registry: Arc<CommandRegistry>,
    repairer: ResponseRepairer,
    memory: ConversationMemory,

    /// Optional semantic memory for recall and auto-save
    semantic: Option<Arc<dyn MemoryBackend>>,
    recall_limit: usize,

    notes: Option<TaskNotes>,
    narrator: Option<Narrator>,

    continuous: bool,
    operator: Option<Arc<dyn Operator>>,
    /// Commands still authorised by an earlier `ApproveMany`
    authorised: u32,

    max_iterations: Option<u32>,
    iterations: u32,
    state: LoopState,
}

impl AgentLoop {
    /// Create a loop whose memory holds only `preamble`, protected.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        registry: Arc<CommandRegistry>,
        preamble: impl Into<String>,
        memory_budget_tokens: usize,
    ) -> Self {
        let mut memory = ConversationMemory::with_budget(memory_budget_tokens);
        memory.protect(Message::system(preamble));
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            registry,
            repairer: ResponseRepairer::new(),
            memory,
            semantic: None,
            recall_limit: 10,
            notes: None,
            narrator: None,
            continuous: true,
            operator: None,
            authorised: 0,
            max_iterations: None,
            iterations: 0,
            state: LoopState::AwaitingModel,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per model reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_repairer(mut self, repairer: ResponseRepairer) -> Self {
        self.repairer = repairer;
        self
    }

    /// Attach a semantic memory for recall and auto-save.
    pub fn with_semantic_memory(mut self, memory: Arc<dyn MemoryBackend>, recall_limit: usize) -> Self {
        self.semantic = Some(memory);
        self.recall_limit = recall_limit;
        self
    }

    pub fn with_notes(mut self, notes: TaskNotes) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Speak each turn's `thoughts.speak` through `narrator`.
    pub fn with_narrator(mut self, narrator: Narrator) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Ask `operator` before every command.
    pub fn with_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = Some(operator);
        self.continuous = false;
        self
    }

    /// Skip operator confirmation even when one is attached.
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_max_iterations(mut self, max: Option<u32>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Run until a terminal command, the iteration limit or operator quit.
    ///
    /// Provider failures that survive retrying end the run with an error.
    pub async fn run(&mut self) -> Result<RunSummary, Error> {
        loop {
            if let Some(max) = self.max_iterations
                && self.iterations >= max
            {
                info!(iterations = self.iterations, "Iteration limit reached");
                self.state = LoopState::Stopped;
                return Ok(self.summary(StopReason::IterationLimit));
            }

            let report = self.step().await?;
            if let Some(reason) = report.stop {
                return Ok(self.summary(reason));
            }
        }
    }

    fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            iterations: self.iterations,
            stop_reason,
        }
    }

    /// Run one full iteration.
    pub async fn step(&mut self) -> Result<StepReport, Error> {
        self.iterations += 1;
        let iteration = self.iterations;
        debug!(iteration, "Agent loop iteration");

        self.state = LoopState::AwaitingModel;
        let reply = self.ask_model().await?;

        self.state = LoopState::Parsing;
        let decision = match self.repairer.repair(&reply).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Model reply could not be parsed");
                let result = format!("{ERROR_PREFIX}{e}");
                self.state = LoopState::Recording;
                self.record(&reply, &result).await;
                self.state = LoopState::AwaitingModel;
                return Ok(StepReport {
                    iteration,
                    reply,
                    decision: None,
                    result,
                    stop: None,
                });
            }
        };

        self.show_thoughts(&decision.thoughts);

        self.state = LoopState::Dispatching;
        let name = decision.command.name.clone();
        info!(command = %name, args = %serde_json::Value::Object(decision.command.args.clone()), "Next action");

        let (result, stop) = match self.gate(&decision).await {
            Gate::Quit => {
                info!("Operator quit");
                self.state = LoopState::Stopped;
                return Ok(StepReport {
                    iteration,
                    reply,
                    decision: Some(decision),
                    result: String::new(),
                    stop: Some(StopReason::OperatorQuit),
                });
            }
            Gate::Feedback(feedback) => (format!("Human feedback: {feedback}"), None),
            Gate::Proceed => {
                let output = self
                    .registry
                    .execute(&name, decision.command.args.clone())
                    .await;
                let stop = self
                    .registry
                    .is_terminal(&name)
                    .then(|| StopReason::TerminalCommand(name.clone()));
                (format!("Command {name} returned: {output}"), stop)
            }
        };
        info!(result = %result, "System");

        self.state = LoopState::Recording;
        self.record(&reply, &result).await;

        self.state = if stop.is_some() {
            LoopState::Stopped
        } else {
            LoopState::AwaitingModel
        };
        Ok(StepReport {
            iteration,
            reply,
            decision: Some(decision),
            result,
            stop,
        })
    }

    /// Drain the narration queue.
    pub async fn shutdown(self) {
        if let Some(narrator) = self.narrator {
            narrator.shutdown().await;
        }
    }

    /// Call the model, evicting the oldest history while the provider
    /// reports the context as too long.
    async fn ask_model(&mut self) -> Result<String, Error> {
        loop {
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: self.compose().await,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            match self.provider.complete_text(request).await {
                Ok(reply) => return Ok(reply),
                Err(ProviderError::ContextLengthExceeded(detail)) => {
                    if !self.memory.shrink() {
                        warn!("Context too long with no history left to evict");
                        return Err(ProviderError::ContextLengthExceeded(detail).into());
                    }
                    debug!(remaining = self.memory.evictable(), "Context too long, evicted oldest message");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Preamble, time, notes, recalled memories, history, then the trigger.
    async fn compose(&self) -> Vec<Message> {
        let mut snapshot = self.memory.snapshot().into_iter();
        let mut messages: Vec<Message> = snapshot.by_ref().take(1).collect();

        messages.push(Message::system(format!(
            "The current time and date is {}",
            Local::now().format("%c")
        )));

        if let Some(notes) = &self.notes
            && let Some(rendered) = notes.render().await
        {
            messages.push(Message::system(format!(
                "Mission critical notes:\n{rendered}"
            )));
        }

        if let Some(recalled) = self.recall().await {
            messages.push(Message::system(format!(
                "This reminds you of these events from your past:\n{recalled}\n\n"
            )));
        }

        messages.extend(snapshot);
        messages.push(Message::user(TRIGGER_PROMPT));
        messages
    }

    async fn recall(&self) -> Option<String> {
        let semantic = self.semantic.as_ref()?;
        let recent: Vec<&str> = self.memory.recent().map(|m| m.content.as_str()).collect();
        if recent.is_empty() {
            return None;
        }
        let query = recent[recent.len().saturating_sub(RECALL_WINDOW)..].join("\n");

        match semantic.get_relevant(&query, self.recall_limit).await {
            Ok(found) if !found.is_empty() => {
                debug!(count = found.len(), "Recalled memories for context");
                Some(found.join("\n"))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Memory recall failed: {e}");
                None
            }
        }
    }

    async fn gate(&mut self, decision: &Decision) -> Gate {
        if self.continuous {
            return Gate::Proceed;
        }
        let Some(operator) = &self.operator else {
            return Gate::Proceed;
        };
        if self.authorised > 0 {
            self.authorised -= 1;
            return Gate::Proceed;
        }
        match operator.confirm(decision).await {
            Confirmation::Approve => Gate::Proceed,
            Confirmation::ApproveMany(n) => {
                self.authorised = n;
                Gate::Proceed
            }
            Confirmation::Reject(feedback) => Gate::Feedback(feedback),
            Confirmation::Quit => Gate::Quit,
        }
    }

    /// Trigger, reply, then result, in execution order.
    async fn record(&mut self, reply: &str, result: &str) {
        self.memory.append(Message::user(TRIGGER_PROMPT));
        self.memory.append(Message::assistant(reply));
        self.memory.append(Message::system(result));

        if let Some(semantic) = &self.semantic {
            let entry = format!("Assistant Reply: {reply} \nResult: {result}");
            if let Err(e) = semantic.add(&entry).await {
                warn!("Failed to save turn to memory: {e}");
            }
        }
    }

    fn show_thoughts(&self, thoughts: &Thoughts) {
        if let Some(text) = &thoughts.text {
            info!(thoughts = %text, "Thoughts");
        }
        if let Some(reasoning) = &thoughts.reasoning {
            info!(reasoning = %reasoning, "Reasoning");
        }
        if let Some(plan) = &thoughts.plan {
            info!(plan = %plan, "Plan");
        }
        if let Some(criticism) = &thoughts.criticism {
            info!(criticism = %criticism, "Criticism");
        }
        if let (Some(narrator), Some(speak)) = (&self.narrator, &thoughts.speak) {
            narrator.say(speak.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SequentialMockProvider, decision_json};
    use issola_core::command::{Command, CommandArgs, required_str};
    use issola_core::error::CommandError;
    use issola_core::message::Role;
    use issola_memory::InMemoryBackend;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Command for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo"
        }
        fn required_args(&self) -> &[&'static str] {
            &["text"]
        }
        async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
            required_str(&args, "text")
        }
    }

    struct Explode;

    #[async_trait]
    impl Command for Explode {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "Explode"
        }
        async fn execute(&self, _args: CommandArgs) -> Result<String, CommandError> {
            panic!("kaboom")
        }
    }

    struct Finish;

    #[async_trait]
    impl Command for Finish {
        fn name(&self) -> &str {
            "task_complete"
        }
        fn description(&self) -> &str {
            "Task Complete (Shutdown)"
        }
        fn is_terminal(&self) -> bool {
            true
        }
        async fn execute(&self, _args: CommandArgs) -> Result<String, CommandError> {
            Ok("Shutting down...".into())
        }
    }

    fn registry() -> Arc<CommandRegistry> {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo));
        registry.register(Box::new(Explode));
        registry.register(Box::new(Finish));
        Arc::new(registry)
    }

    fn agent(provider: Arc<SequentialMockProvider>) -> AgentLoop {
        AgentLoop::new(provider, "smart", registry(), "You are Issola.", usize::MAX)
    }

    fn echo(text: &str) -> String {
        decision_json("echo", json!({ "text": text }))
    }

    fn finish() -> String {
        decision_json("task_complete", json!({}))
    }

    struct Scripted {
        answers: Mutex<Vec<Confirmation>>,
        asked: Mutex<usize>,
    }

    impl Scripted {
        fn new(answers: Vec<Confirmation>) -> Self {
            Self {
                answers: Mutex::new(answers),
                asked: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Operator for Scripted {
        async fn confirm(&self, _decision: &Decision) -> Confirmation {
            *self.asked.lock().unwrap() += 1;
            self.answers.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn command_result_is_recorded_in_order() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&echo("hi")]));
        let mut agent = agent(provider);

        let report = agent.step().await.unwrap();
        assert_eq!(report.result, "Command echo returned: hi");
        assert!(report.stop.is_none());
        assert_eq!(agent.state(), LoopState::AwaitingModel);

        let snapshot = agent.memory().snapshot();
        let roles: Vec<Role> = snapshot.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::System]);
        assert_eq!(snapshot[0].content, "You are Issola.");
        assert_eq!(snapshot[1].content, TRIGGER_PROMPT);
        assert_eq!(snapshot[2].content, echo("hi"));
        assert_eq!(snapshot[3].content, "Command echo returned: hi");
    }

    #[tokio::test]
    async fn request_starts_with_preamble_and_ends_with_trigger() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&echo("a"), &echo("b")]));
        let mut agent = agent(provider.clone());
        agent.step().await.unwrap();
        agent.step().await.unwrap();

        let second = &provider.requests()[1];
        assert_eq!(second.model, "smart");
        let messages = &second.messages;
        assert_eq!(messages[0].content, "You are Issola.");
        assert!(messages[1].content.starts_with("The current time and date is"));
        assert_eq!(messages.last().unwrap().content, TRIGGER_PROMPT);
        assert!(messages.iter().any(|m| m.content == "Command echo returned: a"));
    }

    #[tokio::test]
    async fn unknown_command_is_fed_back() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"I will help.{"command":{"name":"unknown_x","args":{}}}"#,
        ]));
        let mut agent = agent(provider);
        let report = agent.step().await.unwrap();
        assert_eq!(report.decision.unwrap().command.name, "unknown_x");
        assert!(report.result.contains("unknown_x"));
        assert!(report.result.contains("Unknown command"));
        assert!(report.stop.is_none());
    }

    #[tokio::test]
    async fn parse_failure_is_recorded_and_loop_continues() {
        let provider = Arc::new(SequentialMockProvider::texts(&["not json", &finish()]));
        let mut agent = agent(provider);

        let report = agent.step().await.unwrap();
        assert!(report.decision.is_none());
        assert_eq!(report.result, "Error: Invalid JSON");
        let snapshot = agent.memory().snapshot();
        assert_eq!(snapshot[2].content, "not json");
        assert_eq!(snapshot[3].content, "Error: Invalid JSON");

        let summary = agent.run().await.unwrap();
        assert_eq!(summary.iterations, 2);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_error_result() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &decision_json("explode", json!({})),
            &finish(),
        ]));
        let mut agent = agent(provider);
        let report = agent.step().await.unwrap();
        assert!(report.result.starts_with("Command explode returned: Error: "));
        assert_eq!(agent.state(), LoopState::AwaitingModel);
    }

    #[tokio::test]
    async fn terminal_command_stops_after_recording() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&echo("x"), &finish()]));
        let mut agent = agent(provider);
        let summary = agent.run().await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                iterations: 2,
                stop_reason: StopReason::TerminalCommand("task_complete".into()),
            }
        );
        assert_eq!(agent.state(), LoopState::Stopped);
        let last = agent.memory().snapshot().pop().unwrap();
        assert_eq!(last.content, "Command task_complete returned: Shutting down...");
    }

    #[tokio::test]
    async fn iteration_limit_stops_the_run() {
        let provider = Arc::new(SequentialMockProvider::repeating(&echo("again")));
        let mut agent = agent(provider.clone()).with_max_iterations(Some(3));
        let summary = agent.run().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::IterationLimit);
        assert_eq!(summary.iterations, 3);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn context_length_error_evicts_history_and_retries() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(echo("one")),
            Err(ProviderError::ContextLengthExceeded("too long".into())),
            Ok(echo("two")),
        ]));
        let mut agent = agent(provider.clone());
        agent.step().await.unwrap();
        agent.step().await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].messages.len() < requests[1].messages.len());
        assert_eq!(requests[2].messages[0].content, "You are Issola.");
    }

    #[tokio::test]
    async fn context_length_with_nothing_to_evict_is_an_error() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::ContextLengthExceeded("preamble alone".into()),
        )]));
        let mut agent = agent(provider);
        let err = agent.step().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::ContextLengthExceeded(_))
        ));
    }

    #[tokio::test]
    async fn operator_feedback_replaces_dispatch() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&finish()]));
        let operator = Arc::new(Scripted::new(vec![Confirmation::Reject("try google".into())]));
        let mut agent = agent(provider).with_operator(operator);

        let report = agent.step().await.unwrap();
        assert_eq!(report.result, "Human feedback: try google");
        assert!(report.stop.is_none());
    }

    #[tokio::test]
    async fn approve_many_skips_the_next_confirmations() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &echo("1"),
            &echo("2"),
            &echo("3"),
            &echo("4"),
        ]));
        let operator = Arc::new(Scripted::new(vec![
            Confirmation::ApproveMany(2),
            Confirmation::Quit,
        ]));
        let mut agent = agent(provider).with_operator(operator.clone());

        let summary = agent.run().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::OperatorQuit);
        assert_eq!(summary.iterations, 4);
        assert_eq!(*operator.asked.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn continuous_mode_never_asks() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&finish()]));
        let operator = Arc::new(Scripted::new(vec![]));
        let mut agent = agent(provider)
            .with_operator(operator.clone())
            .with_continuous(true);
        agent.run().await.unwrap();
        assert_eq!(*operator.asked.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn semantic_memory_is_saved_and_recalled() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&echo("rustacean"), &finish()]));
        let semantic = Arc::new(InMemoryBackend::new());
        let mut agent = agent(provider.clone()).with_semantic_memory(semantic.clone(), 5);

        agent.run().await.unwrap();
        assert_eq!(semantic.count().await.unwrap(), 2);

        let second = &provider.requests()[1].messages;
        let recalled = second
            .iter()
            .find(|m| m.content.starts_with("This reminds you of these events from your past:"))
            .unwrap();
        assert!(recalled.content.contains("Result: Command echo returned: rustacean"));
    }

    #[tokio::test]
    async fn notes_are_rendered_into_the_request() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&finish()]));
        let notes = TaskNotes::new();
        notes.add("ship the report by friday").await;
        let mut agent = agent(provider.clone()).with_notes(notes);
        agent.run().await.unwrap();

        let messages = &provider.requests()[0].messages;
        assert!(
            messages
                .iter()
                .any(|m| m.content.contains("- ship the report by friday"))
        );
    }
}
