//! Turning raw model output into a [`Decision`].
//!
//! Attempts, cheapest first:
//! 1. strip tabs and parse
//! 2. parse the slice from the first `{` to the last `}`
//! 3. ask the model to fix its own output (when enabled)
//!
//! A value that parses but is not a usable decision is reported with its
//! own [`ParseError`] variant; it is never sent for model repair.

use issola_core::decision::{Decision, ShapeError};
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::prompt::RESPONSE_SCHEMA;

/// Why a model reply could not become a [`Decision`]. Each variant keeps
/// the original text verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON")]
    Syntax { raw: String },

    #[error("Missing 'command' object in JSON")]
    MissingCommand { raw: String },

    #[error("Missing 'name' field in 'command' object")]
    MissingCommandName { raw: String },

    #[error("'args' in 'command' object must be a JSON object")]
    InvalidArgs { raw: String },
}

impl ParseError {
    pub fn raw(&self) -> &str {
        match self {
            Self::Syntax { raw }
            | Self::MissingCommand { raw }
            | Self::MissingCommandName { raw }
            | Self::InvalidArgs { raw } => raw,
        }
    }

    fn from_shape(shape: ShapeError, raw: &str) -> Self {
        let raw = raw.to_string();
        match shape {
            ShapeError::NotAnObject => Self::Syntax { raw },
            ShapeError::MissingCommand => Self::MissingCommand { raw },
            ShapeError::MissingCommandName => Self::MissingCommandName { raw },
            ShapeError::InvalidArgs => Self::InvalidArgs { raw },
        }
    }
}

/// Parse `text` as JSON, tolerating tabs and prose around the object.
fn parse_lenient(text: &str) -> Option<Value> {
    let cleaned = text.replace('\t', "");
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Some(value);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

/// A JSON string holding JSON is unwrapped once.
fn unwrap_encoded(value: Value) -> Value {
    match value {
        Value::String(inner) => parse_lenient(&inner).unwrap_or(Value::String(inner)),
        other => other,
    }
}

/// Repairs model replies into decisions.
pub struct ResponseRepairer {
    model_fix: Option<(Arc<dyn Provider>, String)>,
    approved_commands: String,
}

impl ResponseRepairer {
    /// A repairer that never calls the model.
    pub fn new() -> Self {
        Self {
            model_fix: None,
            approved_commands: String::new(),
        }
    }

    /// Enable step 3: ask `model` on `provider` to fix unparseable replies.
    pub fn with_model(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.model_fix = Some((provider, model.into()));
        self
    }

    /// The command list shown to the model when it is asked for a fix.
    pub fn with_commands(mut self, approved_commands: impl Into<String>) -> Self {
        self.approved_commands = approved_commands.into();
        self
    }

    pub async fn repair(&self, raw: &str) -> Result<Decision, ParseError> {
        if let Some(value) = parse_lenient(raw) {
            return Self::decide(value, raw);
        }

        if let Some(value) = self.fix_with_model(raw).await {
            return Self::decide(value, raw);
        }

        Err(ParseError::Syntax {
            raw: raw.to_string(),
        })
    }

    fn decide(value: Value, raw: &str) -> Result<Decision, ParseError> {
        Decision::from_value(&unwrap_encoded(value)).map_err(|shape| ParseError::from_shape(shape, raw))
    }

    async fn fix_with_model(&self, raw: &str) -> Option<Value> {
        let (provider, model) = self.model_fix.as_ref()?;

        let prompt = format!(
            "'''Broken JSON String:\n{raw}'''\n\nDestination Target Schema:\n{RESPONSE_SCHEMA}\n\
             Fix the provided JSON string to make it parseable and fully compliant with the provided schema.\n\
             Approved Command List:\n{}\n\
             !! If the command supplied by the user isn't on the approved list, substitute as best you can !!\n\n\
             Corrected JSON Structure:",
            self.approved_commands
        );
        let request = ProviderRequest::new(model.clone(), vec![Message::user(prompt)]).with_temperature(0.0);

        let fixed = match provider.complete_text(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Model could not be asked to fix its reply");
                return None;
            }
        };
        debug!(original = %raw, fixed = %fixed, "JSON fix attempt");

        let value = parse_lenient(&fixed);
        if value.is_none() {
            warn!("Failed to fix model output, reporting it back");
        }
        value
    }
}

impl Default for ResponseRepairer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use issola_core::error::ProviderError;

    #[tokio::test]
    async fn clean_json_parses() {
        let d = ResponseRepairer::new()
            .repair(r#"{"command": {"name": "google", "args": {"input": "rust"}}}"#)
            .await
            .unwrap();
        assert_eq!(d.command.name, "google");
        assert_eq!(d.command.args["input"], "rust");
    }

    #[tokio::test]
    async fn tabs_are_stripped() {
        let d = ResponseRepairer::new()
            .repair("{\t\"command\":\t{\"name\": \"list_agents\"}}")
            .await
            .unwrap();
        assert_eq!(d.command.name, "list_agents");
        assert!(d.command.args.is_empty());
    }

    #[tokio::test]
    async fn prose_around_the_object_is_ignored() {
        let d = ResponseRepairer::new()
            .repair(r#"I will help.{"command":{"name":"unknown_x","args":{}}} Thanks!"#)
            .await
            .unwrap();
        assert_eq!(d.command.name, "unknown_x");
    }

    #[tokio::test]
    async fn double_encoded_reply_is_unwrapped_once() {
        let inner = r#"{"command":{"name":"task_complete","args":{}}}"#;
        let raw = serde_json::to_string(inner).unwrap();
        let d = ResponseRepairer::new().repair(&raw).await.unwrap();
        assert_eq!(d.command.name, "task_complete");

        // Three levels deep is still a string after one unwrap.
        let triple = serde_json::to_string(&raw).unwrap();
        assert!(matches!(
            ResponseRepairer::new().repair(&triple).await,
            Err(ParseError::Syntax { .. })
        ));
    }

    #[tokio::test]
    async fn shape_errors_are_distinct() {
        let repairer = ResponseRepairer::new();
        assert!(matches!(
            repairer.repair(r#"{"thoughts": {"text": "hmm"}}"#).await,
            Err(ParseError::MissingCommand { .. })
        ));
        assert!(matches!(
            repairer.repair(r#"{"command": {"args": {}}}"#).await,
            Err(ParseError::MissingCommandName { .. })
        ));
        assert!(matches!(
            repairer.repair(r#"{"command": {"name": "google", "args": [1]}}"#).await,
            Err(ParseError::InvalidArgs { .. })
        ));
        assert!(matches!(
            repairer.repair(r#"{"commands": [{"name": "google"}]}"#).await,
            Err(ParseError::MissingCommand { .. })
        ));
    }

    #[tokio::test]
    async fn unrepairable_text_keeps_the_original() {
        let err = ResponseRepairer::new().repair("no json here").await.unwrap_err();
        assert_eq!(err, ParseError::Syntax { raw: "no json here".into() });
        assert_eq!(err.raw(), "no json here");
        assert_eq!(err.to_string(), "Invalid JSON");
    }

    #[tokio::test]
    async fn model_fixes_broken_json() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"Sure: {"command": {"name": "google", "args": {"input": "rust"}}}"#,
        ]));
        let repairer = ResponseRepairer::new()
            .with_model(provider.clone(), "gpt-4")
            .with_commands("1. Google Search: \"google\"");

        let d = repairer.repair(r#"{command: google "rust"}"#).await.unwrap();
        assert_eq!(d.command.name, "google");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains(r#"{command: google "rust"}"#));
        assert!(prompt.contains("Destination Target Schema"));
        assert!(prompt.contains("1. Google Search"));
    }

    #[tokio::test]
    async fn failed_model_fix_is_a_syntax_error() {
        let provider = Arc::new(SequentialMockProvider::texts(&["still broken"]));
        let repairer = ResponseRepairer::new().with_model(provider, "gpt-4");
        let err = repairer.repair("{{{").await.unwrap_err();
        assert_eq!(err, ParseError::Syntax { raw: "{{{".into() });
    }

    #[tokio::test]
    async fn provider_failure_during_fix_is_a_syntax_error() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::Network("down".into()),
        )]));
        let repairer = ResponseRepairer::new().with_model(provider, "gpt-4");
        assert!(matches!(repairer.repair("{{{").await, Err(ParseError::Syntax { .. })));
    }

    #[tokio::test]
    async fn valid_json_never_reaches_the_model() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let repairer = ResponseRepairer::new().with_model(provider.clone(), "gpt-4");
        assert!(repairer.repair(r#"{"thoughts": {}}"#).await.is_err());
        assert_eq!(provider.call_count(), 0);
    }
}
