//! `contractlens ingest`: chunk, embed and store a text file.

use std::path::PathBuf;

use anyhow::Context;
use contractlens_config::{AppConfig, VectorBackend};
use contractlens_retrieval::IngestRequest;
use tracing::warn;

use super::bootstrap::Runtime;

pub async fn run(
    config: AppConfig,
    path: PathBuf,
    title: Option<String>,
    document_id: Option<String>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {} as UTF-8 text", path.display()))?;
    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    if config.retrieval.backend == VectorBackend::Memory {
        warn!(
            "The in-memory vector store does not outlive this command; \
             configure pinecone or pgvector to keep documents"
        );
    }

    let runtime = Runtime::build(&config).await?;
    let report = runtime
        .ingestor
        .ingest(IngestRequest { title, text, document_id })
        .await
        .with_context(|| format!("failed to ingest {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
