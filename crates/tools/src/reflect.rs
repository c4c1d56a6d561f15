//! One-shot questions outside the main conversation: `ask_myself` puts one
//! to the fast model, `ask_user` to the person running the agent.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::info;

/// A person the agent can put a question to.
#[async_trait]
pub trait UserChannel: Send + Sync {
    /// Show `prompt` and wait for the reply. `None` when no reply can come.
    async fn ask(&self, prompt: &str) -> Option<String>;
}

async fn ask_model(
    provider: &dyn Provider,
    model: &str,
    prompt: String,
) -> Result<String, CommandError> {
    let request = ProviderRequest::new(model, vec![Message::user(prompt)]);
    Ok(provider.complete_text(request).await?)
}

pub struct AskMyselfCommand {
    provider: Arc<dyn Provider>,
    model: String,
}

impl AskMyselfCommand {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Command for AskMyselfCommand {
    fn name(&self) -> &str {
        CommandName::AskMyself.as_str()
    }

    fn description(&self) -> &str {
        "Ask yourself a question"
    }

    fn required_args(&self) -> &[&'static str] {
        &["prompt"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let prompt = required_str(&args, "prompt")?;
        ask_model(self.provider.as_ref(), &self.model, prompt).await
    }
}

/// Asks the user, then has the fast model break the answer down into
/// tasks, context and priorities.
pub struct AskUserCommand {
    provider: Arc<dyn Provider>,
    model: String,
    user: Arc<dyn UserChannel>,
}

impl AskUserCommand {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        user: Arc<dyn UserChannel>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            user,
        }
    }

    async fn ask(&self, prompt: String) -> Result<String, CommandError> {
        ask_model(self.provider.as_ref(), &self.model, prompt).await
    }
}

#[async_trait]
impl Command for AskUserCommand {
    fn name(&self) -> &str {
        CommandName::AskUser.as_str()
    }

    fn description(&self) -> &str {
        "Ask the user a question"
    }

    fn required_args(&self) -> &[&'static str] {
        &["prompt"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let prompt = required_str(&args, "prompt")?;
        let response = self
            .user
            .ask(&prompt)
            .await
            .ok_or_else(|| CommandError::ExecutionFailed {
                command: CommandName::AskUser.as_str().into(),
                reason: "no reply from the user".into(),
            })?;

        let tasks = self
            .ask(format!(
                "Users message: {response} \n Task mapping: Create a mapping of user intents to associated subtasks. Each intent can be associated with a list of subtasks that must be completed to address the user's request. For example, if the user intent is 'recommendation', the subtasks might include 'identify_preferences', 'gather_options', and 'present_recommendations'"
            ))
            .await?;
        let context = self
            .ask(format!(
                "Users message: {response} \n Context extraction: Extract contextual information from the user's input that can help guide the execution of subtasks. This might involve identifying relevant keywords, entities, or relationships within the text."
            ))
            .await?;
        let prioritized = self
            .ask(format!(
                "Users message: {response} \n Extrapolated Tasks: {tasks} \n Subtask prioritization: Prioritize the order in which subtasks should be executed based on the user's input and the extracted context. Some subtasks may depend on the completion of others, or their priority may be determined by the user's specific requirements."
            ))
            .await?;

        let reasoning = format!(
            "Users Response: {response} \n Internal reasoning: {tasks} \n Prioritized Tasks: {prioritized} \n Internal Context Assessment: {context} \n"
        );
        info!(reply_chars = response.len(), "User answered");
        Ok(reasoning)
    }
}
