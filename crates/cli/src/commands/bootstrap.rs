//! Wires every component from an [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use contractlens_agent::{ConversationStore, Executor};
use contractlens_config::AppConfig;
use contractlens_core::event::EventBus;
use contractlens_gateway::{ApiV1State, SharedApiState};
use contractlens_retrieval::{DocumentCatalog, Ingestor, RetrievalClient, build_vector_store};
use tracing::info;

pub struct Runtime {
    pub event_bus: Arc<EventBus>,
    pub retrieval: Arc<RetrievalClient>,
    pub ingestor: Arc<Ingestor>,
    pub executor: Arc<Executor>,
    pub conversations: Arc<ConversationStore>,
}

impl Runtime {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let providers = contractlens_providers::build_from_config(config)
            .context("failed to configure providers")?;
        let chat = providers.chat().context("chat provider unavailable")?;
        let embedder = providers.embeddings().context("embedding provider unavailable")?;

        let store = build_vector_store(&config.retrieval)
            .await
            .context("failed to open vector store")?;
        let catalog = Arc::new(DocumentCatalog::new());
        let event_bus = Arc::new(EventBus::default());

        let retrieval = Arc::new(RetrievalClient::from_config(
            embedder.clone(),
            store.clone(),
            &config.retrieval,
        ));
        let ingestor = Arc::new(
            Ingestor::from_config(
                &config.ingestion,
                embedder,
                &config.retrieval.embedding_model,
                store.clone(),
                catalog.clone(),
            )
            .context("invalid ingestion settings")?
            .with_events(event_bus.clone()),
        );

        let tools = Arc::new(contractlens_tools::default_registry(
            retrieval.clone(),
            catalog,
            Duration::from_secs(config.agent.tool_timeout_secs),
        ));
        let executor = Arc::new(Executor::from_config(config, chat, tools, event_bus.clone()));
        let conversations = Arc::new(ConversationStore::from_config(&config.conversation));

        info!(
            provider = executor.provider_name(),
            model = executor.model(),
            vector_store = store.name(),
            "Runtime ready"
        );

        Ok(Self { event_bus, retrieval, ingestor, executor, conversations })
    }

    pub fn api_state(&self) -> SharedApiState {
        Arc::new(ApiV1State::new(
            self.executor.clone(),
            self.conversations.clone(),
            self.retrieval.clone(),
            self.ingestor.clone(),
            self.event_bus.clone(),
        ))
    }
}
