//! Configuration loading, validation, and management for ContractLens.
//!
//! Loads configuration from `~/.contractlens/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.contractlens/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key used when a provider has no key of its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat provider: "openai", "anthropic", or any name under `[providers]`
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Provider-specific overrides (keys, base URLs)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("conversation", &self.conversation)
            .field("retrieval", &self.retrieval)
            .field("ingestion", &self.ingestion)
            .field("gateway", &self.gateway)
            .field("retry", &self.retry)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Executor limits and prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// LLM calls allowed to request tools in one run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Tool executions allowed in one run
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    /// Tool output longer than this is truncated before reaching the model
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_iterations() -> u32 {
    6
}
fn default_max_tool_calls() -> u32 {
    12
}
fn default_max_tool_output_chars() -> usize {
    8000
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_system_prompt() -> String {
    "You are ContractLens, an assistant that analyzes legal contracts. \
     Use the search_contract tool to find the relevant clauses before answering, \
     quote the language you rely on, and name the document it came from. \
     If the contracts do not address the question, say so plainly. \
     You do not give legal advice."
        .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tool_calls: default_max_tool_calls(),
            max_tool_output_chars: default_max_tool_output_chars(),
            tool_timeout_secs: default_tool_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Conversation store bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// User turns kept per session
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Sessions kept before the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_idle_ttl_minutes")]
    pub idle_ttl_minutes: u64,
}

fn default_max_turns() -> usize {
    10
}
fn default_max_sessions() -> usize {
    1000
}
fn default_idle_ttl_minutes() -> u64 {
    60
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_sessions: default_max_sessions(),
            idle_ttl_minutes: default_idle_ttl_minutes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Memory,
    Pinecone,
    Pgvector,
}

impl std::fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Pinecone => "pinecone",
            Self::Pgvector => "pgvector",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Provider used for embeddings (must support them; Anthropic does not)
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chunks returned per query when the caller doesn't say
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Results scoring below this cosine similarity are dropped
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone: Option<PineconeConfig>,

    /// PostgreSQL connection string for the pgvector backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_pg_table")]
    pub pg_table: String,

    /// Vector width; must match the embedding model
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.25
}
fn default_pg_table() -> String {
    "contract_chunks".into()
}
fn default_dimensions() -> usize {
    1536
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            pinecone: None,
            database_url: None,
            pg_table: default_pg_table(),
            dimensions: default_dimensions(),
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("backend", &self.backend)
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_model", &self.embedding_model)
            .field("top_k", &self.top_k)
            .field("similarity_threshold", &self.similarity_threshold)
            .field("pinecone", &self.pinecone)
            .field("database_url", &redact(&self.database_url))
            .field("pg_table", &self.pg_table)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Data-plane host of the index, e.g. `https://contracts-abc123.svc.us-east1-gcp.pinecone.io`
    pub index_host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub namespace: String,
}

impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("index_host", &self.index_host)
            .field("api_key", &redact(&self.api_key))
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed-size character windows
    Fixed,
    /// Paragraph, then line, then sentence, then word boundaries
    #[default]
    Recursive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Texts sent per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}
fn default_embed_batch_size() -> usize {
    64
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: ChunkingStrategy::default(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Upper bound on request bodies, uploads included
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: vec![],
        }
    }
}

/// Retry policy for provider HTTP calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or `~/.contractlens/config.toml` when `None`,
    /// then apply environment overrides and validate.
    ///
    /// Environment variables:
    /// - `CONTRACTLENS_API_KEY`: fallback key for every provider
    /// - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`: per-provider keys
    /// - `CONTRACTLENS_PROVIDER`, `CONTRACTLENS_MODEL`
    /// - `PINECONE_API_KEY`, `DATABASE_URL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup. Values already present in
    /// the file win for keys; provider and model always follow the environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CONTRACTLENS_API_KEY");
        }

        for (provider, var) in [("openai", "OPENAI_API_KEY"), ("anthropic", "ANTHROPIC_API_KEY")] {
            if let Some(key) = lookup(var) {
                let entry = self.providers.entry(provider.to_string()).or_default();
                if entry.api_key.is_none() {
                    entry.api_key = Some(key);
                }
            }
        }

        if let Some(provider) = lookup("CONTRACTLENS_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("CONTRACTLENS_MODEL") {
            self.default_model = model;
        }

        if let Some(key) = lookup("PINECONE_API_KEY")
            && let Some(pinecone) = self.retrieval.pinecone.as_mut()
            && pinecone.api_key.is_none()
        {
            pinecone.api_key = Some(key);
        }
        if self.retrieval.database_url.is_none() {
            self.retrieval.database_url = lookup("DATABASE_URL");
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contractlens")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if !(0.0..=2.0).contains(&self.default_temperature) {
            return fail("default_temperature must be between 0.0 and 2.0");
        }
        if self.agent.max_iterations == 0 {
            return fail("agent.max_iterations must be at least 1");
        }
        if self.agent.max_tool_calls == 0 {
            return fail("agent.max_tool_calls must be at least 1");
        }
        if self.agent.max_tool_output_chars == 0 {
            return fail("agent.max_tool_output_chars must be at least 1");
        }
        if self.conversation.max_turns == 0 || self.conversation.max_sessions == 0 {
            return fail("conversation.max_turns and conversation.max_sessions must be at least 1");
        }
        if self.retrieval.top_k == 0 || self.retrieval.top_k > 50 {
            return fail("retrieval.top_k must be between 1 and 50");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return fail("retrieval.similarity_threshold must be between -1.0 and 1.0");
        }
        if self.ingestion.chunk_size == 0 {
            return fail("ingestion.chunk_size must be at least 1");
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return fail("ingestion.chunk_overlap must be smaller than ingestion.chunk_size");
        }
        if self.ingestion.embed_batch_size == 0 {
            return fail("ingestion.embed_batch_size must be at least 1");
        }

        match self.retrieval.backend {
            VectorBackend::Memory => {}
            VectorBackend::Pinecone => match &self.retrieval.pinecone {
                Some(p) if !p.index_host.is_empty() => {}
                _ => {
                    return fail(
                        "retrieval.pinecone.index_host is required for the pinecone backend",
                    );
                }
            },
            VectorBackend::Pgvector => {
                if self.retrieval.database_url.is_none() {
                    return fail(
                        "retrieval.database_url (or DATABASE_URL) is required for the pgvector backend",
                    );
                }
                let table = &self.retrieval.pg_table;
                if table.is_empty()
                    || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return fail("retrieval.pg_table must be a plain identifier");
                }
            }
        }

        Ok(())
    }

    /// Resolve the API key for a provider: its own section first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            conversation: ConversationConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingestion: IngestionConfig::default(),
            gateway: GatewayConfig::default(),
            retry: RetryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.retrieval.backend, VectorBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, "gpt-4o-mini");
        assert_eq!(parsed.agent.max_tool_calls, 12);
        assert_eq!(parsed.ingestion.strategy, ChunkingStrategy::Recursive);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"

[agent]
max_iterations = 3

[retrieval]
backend = "pinecone"
top_k = 8

[retrieval.pinecone]
index_host = "https://contracts-abc.svc.pinecone.io"
namespace = "acme"

[ingestion]
strategy = "fixed"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.max_tool_calls, 12);
        assert_eq!(config.retrieval.backend, VectorBackend::Pinecone);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.ingestion.strategy, ChunkingStrategy::Fixed);
        assert_eq!(config.ingestion.chunk_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_temperature = \"hot\"").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn invalid_values_rejected() {
        let config = AppConfig { default_temperature: 5.0, ..AppConfig::default() };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ingestion.chunk_overlap = config.ingestion.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_tool_calls = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retrieval.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backends_require_their_settings() {
        let mut config = AppConfig::default();
        config.retrieval.backend = VectorBackend::Pinecone;
        assert!(config.validate().is_err());

        config.retrieval.backend = VectorBackend::Pgvector;
        assert!(config.validate().is_err());
        config.retrieval.database_url = Some("postgres://localhost/contracts".into());
        assert!(config.validate().is_ok());
        config.retrieval.pg_table = "chunks; drop table x".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_fill_missing_keys() {
        let mut config = AppConfig::default();
        config.retrieval.pinecone = Some(PineconeConfig {
            index_host: "https://idx".into(),
            ..PineconeConfig::default()
        });
        config.apply_env_overrides(env(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("CONTRACTLENS_MODEL", "gpt-4o"),
            ("PINECONE_API_KEY", "pc-key"),
            ("DATABASE_URL", "postgres://db"),
        ]));

        assert_eq!(config.api_key_for("openai").as_deref(), Some("sk-openai"));
        assert_eq!(config.api_key_for("anthropic").as_deref(), Some("sk-ant"));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(
            config.retrieval.pinecone.as_ref().and_then(|p| p.api_key.as_deref()),
            Some("pc-key")
        );
        assert_eq!(config.retrieval.database_url.as_deref(), Some("postgres://db"));
    }

    #[test]
    fn file_keys_beat_environment() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig { api_key: Some("from-file".into()), ..ProviderConfig::default() },
        );
        config.apply_env_overrides(env(&[
            ("OPENAI_API_KEY", "from-env"),
            ("CONTRACTLENS_API_KEY", "global"),
        ]));
        assert_eq!(config.api_key_for("openai").as_deref(), Some("from-file"));
        assert_eq!(config.api_key_for("custom").as_deref(), Some("global"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig { api_key: Some("sk-secret".into()), ..AppConfig::default() };
        config.retrieval.database_url = Some("postgres://user:pw@db".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("user:pw"));
        assert!(debug.contains("[REDACTED]"));
    }
}
