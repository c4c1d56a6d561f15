//! Scripted collaborators shared by the command tests.

use async_trait::async_trait;
use issola_core::error::{CommandError, ProviderError};
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::web::WebClient;

/// Replies with a fixed text and keeps every request it saw.
pub struct EchoProvider {
    reply: String,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl EchoProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: Message::assistant(self.reply.clone()),
            usage: None,
            model,
        })
    }
}

/// Serves one canned page for every URL, or fails with a status code.
pub struct StaticWeb {
    text: Option<String>,
    status: u16,
    fetches: AtomicUsize,
}

impl StaticWeb {
    pub fn page(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            status: 200,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            text: None,
            status,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebClient for StaticWeb {
    async fn fetch_text(&self, _url: &str) -> Result<String, CommandError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.text.clone().ok_or(CommandError::HttpStatus(self.status))
    }

    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, CommandError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.text {
            Some(_) => Ok(vec![format!("Home ({url}/)")]),
            None => Err(CommandError::HttpStatus(self.status)),
        }
    }
}
