//! Code helpers backed by the fast model: `evaluate_code`, `improve_code`
//! and `write_tests`.
//!
//! The model is told to act as a function with a fixed signature and to
//! answer with nothing but that function's return value.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, optional_str};
use issola_core::error::CommandError;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTask {
    Evaluate,
    Improve,
    WriteTests,
}

impl CodeTask {
    pub const ALL: [CodeTask; 3] = [CodeTask::Evaluate, CodeTask::Improve, CodeTask::WriteTests];

    fn name(self) -> CommandName {
        match self {
            Self::Evaluate => CommandName::EvaluateCode,
            Self::Improve => CommandName::ImproveCode,
            Self::WriteTests => CommandName::WriteTests,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Evaluate => "Evaluate Code",
            Self::Improve => "Get Improved Code",
            Self::WriteTests => "Write Tests",
        }
    }

    fn required_args(self) -> &'static [&'static str] {
        match self {
            Self::Evaluate | Self::WriteTests => &["code"],
            Self::Improve => &["suggestions", "code"],
        }
    }

    fn optional_args(self) -> &'static [&'static str] {
        match self {
            Self::WriteTests => &["focus"],
            Self::Evaluate | Self::Improve => &[],
        }
    }

    fn signature(self) -> &'static str {
        match self {
            Self::Evaluate => "fn analyze_code(code: &str) -> Vec<String>",
            Self::Improve => "fn generate_improved_code(suggestions: &[String], code: &str) -> String",
            Self::WriteTests => "fn create_test_cases(code: &str, focus: Option<&str>) -> String",
        }
    }

    fn purpose(self) -> &'static str {
        match self {
            Self::Evaluate => {
                "Analyzes the given code and returns a list of suggestions for improvements."
            }
            Self::Improve => {
                "Improves the provided code based on the suggestions provided, making no other changes."
            }
            Self::WriteTests => {
                "Generates test cases for the existing code, focusing on specific areas if required."
            }
        }
    }
}

/// Text of an argument that may arrive as a string or as a list.
///
/// Lists are passed on as their JSON text.
fn text_arg(args: &CommandArgs, key: &str) -> Result<String, CommandError> {
    match args.get(key) {
        Some(Value::Array(items)) => Ok(Value::Array(items.clone()).to_string()),
        _ => optional_str(args, key)
            .ok_or_else(|| CommandError::InvalidArguments(format!("Missing '{key}' argument"))),
    }
}

pub struct CodeCommand {
    task: CodeTask,
    provider: Arc<dyn Provider>,
    model: String,
}

impl CodeCommand {
    pub fn new(task: CodeTask, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            task,
            provider,
            model: model.into(),
        }
    }

    /// One command per code task, all on the same model.
    pub fn all(provider: Arc<dyn Provider>, model: &str) -> Vec<Self> {
        CodeTask::ALL
            .into_iter()
            .map(|task| Self::new(task, Arc::clone(&provider), model))
            .collect()
    }

    fn inputs(&self, args: &CommandArgs) -> Result<Vec<String>, CommandError> {
        let code = text_arg(args, "code")?;
        Ok(match self.task {
            CodeTask::Evaluate => vec![code],
            CodeTask::Improve => vec![text_arg(args, "suggestions")?, code],
            CodeTask::WriteTests => {
                let focus = optional_str(args, "focus").unwrap_or_else(|| "None".into());
                vec![code, focus]
            }
        })
    }
}

#[async_trait]
impl Command for CodeCommand {
    fn name(&self) -> &str {
        self.task.name().as_str()
    }

    fn description(&self) -> &str {
        self.task.description()
    }

    fn required_args(&self) -> &[&'static str] {
        self.task.required_args()
    }

    fn optional_args(&self) -> &[&'static str] {
        self.task.optional_args()
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let inputs = self.inputs(&args)?;
        debug!(command = %self.task.name(), "Calling model as a function");
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(format!(
                    "You are now the following function: ```// {}\n{}```\n\nOnly respond with your `return` value.",
                    self.task.purpose(),
                    self.task.signature()
                )),
                Message::user(inputs.join(", ")),
            ],
        )
        .with_temperature(0.0);
        Ok(self.provider.complete_text(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EchoProvider;
    use serde_json::json;

    fn args(value: Value) -> CommandArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn evaluate_sends_signature_and_code() {
        let provider = Arc::new(EchoProvider::new(r#"["use a match"]"#));
        let cmd = CodeCommand::new(CodeTask::Evaluate, provider.clone(), "fast");

        let out = cmd.execute(args(json!({"code": "if x == 1 {}"}))).await.unwrap();
        assert_eq!(out, r#"["use a match"]"#);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "fast");
        assert_eq!(requests[0].temperature, 0.0);
        assert!(requests[0].messages[0].content.contains("fn analyze_code(code: &str)"));
        assert_eq!(requests[0].messages[1].content, "if x == 1 {}");
    }

    #[tokio::test]
    async fn improve_accepts_a_list_of_suggestions() {
        let provider = Arc::new(EchoProvider::new("fn main() {}"));
        let cmd = CodeCommand::new(CodeTask::Improve, provider.clone(), "fast");

        cmd.execute(args(json!({"suggestions": ["rename x"], "code": "fn x() {}"})))
            .await
            .unwrap();
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[1].content, r#"["rename x"], fn x() {}"#);
    }

    #[tokio::test]
    async fn tests_focus_is_optional() {
        let provider = Arc::new(EchoProvider::new("#[test] fn t() {}"));
        let cmd = CodeCommand::new(CodeTask::WriteTests, provider.clone(), "fast");

        cmd.execute(args(json!({"code": "fn add() {}"}))).await.unwrap();
        cmd.execute(args(json!({"code": "fn add() {}", "focus": "overflow"})))
            .await
            .unwrap();
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[1].content, "fn add() {}, None");
        assert_eq!(requests[1].messages[1].content, "fn add() {}, overflow");
    }

    #[test]
    fn argument_contracts() {
        let provider: Arc<dyn Provider> = Arc::new(EchoProvider::new(""));
        let names: Vec<(String, Vec<&str>)> = CodeCommand::all(provider, "fast")
            .iter()
            .map(|c| (c.name().to_string(), c.required_args().to_vec()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("evaluate_code".to_string(), vec!["code"]),
                ("improve_code".to_string(), vec!["suggestions", "code"]),
                ("write_tests".to_string(), vec!["code"]),
            ]
        );
    }
}
