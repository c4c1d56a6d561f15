//! Bounded exponential backoff around any provider.
//!
//! Transient failures (rate limits, timeouts, network errors, 5xx) are
//! retried with `base_delay * 2^attempt`, capped at `max_delay`. A
//! server-supplied `retry_after` wins when it is longer. Everything else is
//! returned immediately so the caller can react (shrink context, report auth).

use async_trait::async_trait;
use issola_core::error::ProviderError;
use issola_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry limits for one logical model call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound for a single attempt
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.backoff(attempt);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&issola_config::RetryConfig> for RetryPolicy {
    fn from(config: &issola_config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// A provider that retries transient failures of the wrapped provider.
pub struct RetryingProvider {
    inner: Arc<dyn issola_core::Provider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn issola_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl issola_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let outcome =
                tokio::time::timeout(self.policy.request_timeout, self.inner.complete(request.clone()))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::Timeout(format!(
                            "'{}' did not answer within {}s",
                            self.inner.name(),
                            self.policy.request_timeout.as_secs()
                        )))
                    });

            let error = match outcome {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(
                    provider = %self.inner.name(),
                    attempts = attempt,
                    error = %error,
                    "Giving up on model call"
                );
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_for(attempt - 1, &error);
            info!(
                provider = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient provider error, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
