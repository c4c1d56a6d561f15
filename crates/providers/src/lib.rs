//! LLM Provider implementations for Issola.
//!
//! All providers implement the `issola_core::Provider` trait.
//! [`build_from_config`] assembles the provider the agent actually talks to.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryingProvider};

use issola_core::Provider;
use issola_core::error::ProviderError;
use std::sync::Arc;

/// Build the retrying OpenAI-compatible provider described by `config`.
///
/// The hosted OpenAI endpoint requires a key; self-hosted endpoints
/// (Ollama, vLLM) are allowed to run without one.
pub fn build_from_config(
    config: &issola_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if config.api_url.contains("api.openai.com") => {
            return Err(ProviderError::NotConfigured(
                "no API key; set ISSOLA_API_KEY or OPENAI_API_KEY".into(),
            ));
        }
        None => String::new(),
    };

    let inner: Arc<dyn Provider> =
        Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key));
    Ok(Arc::new(RetryingProvider::new(
        inner,
        RetryPolicy::from(&config.retry),
    )))
}
