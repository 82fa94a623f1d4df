//! Provider router: builds the chat and embedding providers from config.
//!
//! Every provider the router hands out is wrapped in a [`RetryProvider`].

use std::collections::HashMap;
use std::sync::Arc;

use contractlens_config::AppConfig;
use contractlens_core::error::ProviderError;
use contractlens_core::provider::Provider;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryPolicy, RetryProvider};

pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    chat_provider: String,
    embedding_provider: String,
}

impl ProviderRouter {
    pub fn new(chat_provider: impl Into<String>, embedding_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            chat_provider: chat_provider.into(),
            embedding_provider: embedding_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// The provider answering chat completions.
    pub fn chat(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(&self.chat_provider)
            .ok_or_else(|| ProviderError::NotConfigured(self.chat_provider.clone()))
    }

    /// The provider computing embeddings for ingestion and retrieval.
    pub fn embeddings(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(&self.embedding_provider)
            .ok_or_else(|| ProviderError::NotConfigured(self.embedding_provider.clone()))
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build the chat and embedding providers named in the configuration.
///
/// Fails when either needs an API key and none is configured.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let chat = config.default_provider.as_str();
    let embed = config.retrieval.embedding_provider.as_str();

    if embed == "anthropic" {
        return Err(ProviderError::NotConfigured(
            "anthropic does not offer embeddings; set retrieval.embedding_provider".into(),
        ));
    }

    let policy = RetryPolicy::from_config(&config.retry);
    let mut router = ProviderRouter::new(chat, embed);

    for name in [chat, embed] {
        if router.get(name).is_some() {
            continue;
        }
        let provider = build_provider(config, name)?;
        debug!(provider = name, "Provider configured");
        router.register(name, Arc::new(RetryProvider::new(provider, policy.clone())));
    }

    Ok(router)
}

fn build_provider(config: &AppConfig, name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_url = config.providers.get(name).and_then(|p| p.api_url.clone());
    let api_key = match config.api_key_for(name) {
        Some(key) => key,
        None if is_local(name) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}'"
            )));
        }
    };

    let provider: Arc<dyn Provider> = if name == "anthropic" {
        let mut p = AnthropicProvider::new(api_key);
        if let Some(url) = api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = api_url.unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
    };
    Ok(provider)
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
