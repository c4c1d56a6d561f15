//! Shared test helpers for the loop, repairer and research tests.

use issola_core::error::ProviderError;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue and records
/// the request. Panics if more calls are made than replies provided, unless
/// built with [`repeating`](Self::repeating).
pub struct SequentialMockProvider {
    replies: Vec<Result<String, ProviderError>>,
    repeat_last: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies,
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Successful text replies, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Answers every call with `text`.
    pub fn repeating(text: &str) -> Self {
        Self {
            repeat_last: true,
            ..Self::texts(&[text])
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let count = requests.len();
        requests.push(request);

        let reply = match self.replies.get(count) {
            Some(reply) => reply.clone(),
            None if self.repeat_last && !self.replies.is_empty() => {
                self.replies[self.replies.len() - 1].clone()
            }
            None => panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                self.replies.len()
            ),
        };
        reply.map(|text| make_text_response(&text))
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A reply in the response format that asks for `name` with `args`.
pub fn decision_json(name: &str, args: serde_json::Value) -> String {
    serde_json::json!({
        "thoughts": {
            "text": format!("use {name}"),
            "reasoning": "scripted",
            "plan": "- step",
            "criticism": "none",
            "speak": format!("Running {name}")
        },
        "command": { "name": name, "args": args }
    })
    .to_string()
}
