//! `contractlens serve`: start the HTTP API server.

use anyhow::Context;
use contractlens_config::{AppConfig, VectorBackend};
use tracing::warn;

use super::bootstrap::Runtime;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let runtime = Runtime::build(&config).await?;
    if config.retrieval.backend == VectorBackend::Memory {
        warn!("Using the in-memory vector store; ingested documents are lost on restart");
    }

    println!("ContractLens API");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", runtime.executor.model(), runtime.executor.provider_name());
    println!("   Store:     {}", config.retrieval.backend);

    contractlens_gateway::start(runtime.api_state(), &config.gateway, &config.conversation)
        .await
        .context("gateway failed")
}
