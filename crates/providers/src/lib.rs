//! LLM provider implementations for ContractLens.
//!
//! All providers implement `contractlens_core::Provider`. The router builds
//! the chat and embedding providers from configuration and wraps them in the
//! retry decorator.

pub mod anthropic;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};
pub use router::{ProviderRouter, build_from_config};

use std::time::Duration;

/// HTTP client with a whole-request timeout. If the TLS backend cannot be
/// initialised the default client is used and the timeout is lost, so that
/// case is logged.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                timeout_secs = timeout.as_secs(),
                "Failed to build HTTP client; falling back to defaults without a timeout"
            );
            reqwest::Client::new()
        })
}
