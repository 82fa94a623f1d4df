//! Retry decorator with exponential backoff and per-attempt timeouts.
//!
//! Wraps any provider. Rate limits, timeouts, network failures and 5xx
//! responses are retried; authentication and other 4xx errors fail at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contractlens_config::RetryConfig;
use contractlens_core::error::ProviderError;
use contractlens_core::provider::*;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A single attempt with no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(120),
        }
    }

    /// Delay before retry number `attempt` (0-based). A rate-limit hint
    /// longer than the computed backoff wins.
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
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
        Self::from_config(&RetryConfig::default())
    }
}

pub struct RetryProvider {
    inner: Arc<dyn contractlens_core::Provider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn contractlens_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let provider = self.inner.name();
        let mut attempt = 0u32;

        loop {
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "{provider} {operation} exceeded {}s",
                    self.policy.attempt_timeout.as_secs()
                ))),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        info!(provider, operation, attempt, "Provider call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.policy.max_retries {
                warn!(provider, operation, attempt, error = %err, "Provider call failed");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt, &err);
            warn!(
                provider,
                operation,
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying provider call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl contractlens_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.run("complete", || self.inner.complete(request.clone())).await
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        self.run("embed", || self.inner.embed(request.clone())).await
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
