//! Sub-agents: short-lived conversations with the fast model that the main
//! agent can delegate work to.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct SubAgent {
    task: String,
    history: Vec<Message>,
}

#[derive(Default)]
struct Agents {
    next_key: u64,
    live: BTreeMap<u64, SubAgent>,
}

/// Owns every sub-agent's history. Keys are assigned sequentially from 0.
pub struct AgentManager {
    provider: Arc<dyn Provider>,
    model: String,
    agents: Mutex<Agents>,
}

impl AgentManager {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            agents: Mutex::new(Agents::default()),
        }
    }

    async fn chat(&self, history: Vec<Message>) -> Result<String, CommandError> {
        let request = ProviderRequest::new(self.model.clone(), history);
        Ok(self.provider.complete_text(request).await?)
    }

    /// Start an agent for `task`, opening with `first_message`.
    /// Returns the new key and the agent's reply.
    pub async fn create(&self, task: &str, first_message: &str) -> Result<(u64, String), CommandError> {
        let mut history = vec![Message::user(first_message)];
        let reply = self.chat(history.clone()).await?;
        history.push(Message::assistant(reply.clone()));

        let mut agents = self.agents.lock().await;
        let key = agents.next_key;
        agents.next_key += 1;
        agents.live.insert(
            key,
            SubAgent {
                task: task.to_string(),
                history,
            },
        );
        info!(key, task, "Sub-agent started");
        Ok((key, reply))
    }

    /// Send `message` to agent `key` and return its reply.
    pub async fn message(&self, key: u64, message: &str) -> Result<String, CommandError> {
        let mut history = self
            .agents
            .lock()
            .await
            .live
            .get(&key)
            .map(|agent| agent.history.clone())
            .ok_or_else(|| CommandError::NotFound(format!("agent {key}")))?;
        history.push(Message::user(message));

        let reply = self.chat(history).await?;

        let mut agents = self.agents.lock().await;
        if let Some(agent) = agents.live.get_mut(&key) {
            agent.history.push(Message::user(message));
            agent.history.push(Message::assistant(reply.clone()));
        }
        debug!(key, "Sub-agent replied");
        Ok(reply)
    }

    /// `(key, task)` for every live agent, by key.
    pub async fn list(&self) -> Vec<(u64, String)> {
        self.agents
            .lock()
            .await
            .live
            .iter()
            .map(|(key, agent)| (*key, agent.task.clone()))
            .collect()
    }

    pub async fn delete(&self, key: u64) -> bool {
        self.agents.lock().await.live.remove(&key).is_some()
    }
}

/// Agent keys arrive as numbers or as numeric strings.
fn parse_key(args: &CommandArgs) -> Result<u64, CommandError> {
    let raw = match args.get("key") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Err(CommandError::InvalidArguments("Missing 'key' argument".into())),
    };
    raw.parse()
        .map_err(|_| CommandError::InvalidArguments(format!("Invalid agent key '{raw}'")))
}

pub struct StartAgentCommand {
    manager: Arc<AgentManager>,
}

impl StartAgentCommand {
    pub fn new(manager: Arc<AgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Command for StartAgentCommand {
    fn name(&self) -> &str {
        CommandName::StartAgent.as_str()
    }

    fn description(&self) -> &str {
        "Start GPT Agent"
    }

    fn required_args(&self) -> &[&'static str] {
        &["name", "task", "prompt"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let name = required_str(&args, "name")?;
        let task = required_str(&args, "task")?;
        let prompt = required_str(&args, "prompt")?;

        let first_message = format!("You are {name}.  Respond with: \"Acknowledged\".");
        let (key, _ack) = self.manager.create(&task, &first_message).await?;
        let response = self.manager.message(key, &prompt).await?;
        Ok(format!(
            "Agent {name} created with key {key}. First response: {response}"
        ))
    }
}

pub struct MessageAgentCommand {
    manager: Arc<AgentManager>,
}

impl MessageAgentCommand {
    pub fn new(manager: Arc<AgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Command for MessageAgentCommand {
    fn name(&self) -> &str {
        CommandName::MessageAgent.as_str()
    }

    fn description(&self) -> &str {
        "Message GPT Agent"
    }

    fn required_args(&self) -> &[&'static str] {
        &["key", "message"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let key = parse_key(&args)?;
        let message = required_str(&args, "message")?;
        self.manager.message(key, &message).await
    }
}

pub struct ListAgentsCommand {
    manager: Arc<AgentManager>,
}

impl ListAgentsCommand {
    pub fn new(manager: Arc<AgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Command for ListAgentsCommand {
    fn name(&self) -> &str {
        CommandName::ListAgents.as_str()
    }

    fn description(&self) -> &str {
        "List GPT Agents"
    }

    async fn execute(&self, _args: CommandArgs) -> Result<String, CommandError> {
        let agents = self.manager.list().await;
        if agents.is_empty() {
            return Ok("No agents running.".into());
        }
        Ok(agents
            .iter()
            .map(|(key, task)| format!("{key}: {task}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

pub struct DeleteAgentCommand {
    manager: Arc<AgentManager>,
}

impl DeleteAgentCommand {
    pub fn new(manager: Arc<AgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Command for DeleteAgentCommand {
    fn name(&self) -> &str {
        CommandName::DeleteAgent.as_str()
    }

    fn description(&self) -> &str {
        "Delete GPT Agent"
    }

    fn required_args(&self) -> &[&'static str] {
        &["key"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let key = parse_key(&args)?;
        if self.manager.delete(key).await {
            Ok(format!("Agent {key} deleted."))
        } else {
            Ok(format!("Agent {key} does not exist."))
        }
    }
}
