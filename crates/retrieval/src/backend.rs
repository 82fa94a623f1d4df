//! Vector store selection from configuration.

use std::sync::Arc;

use contractlens_config::{RetrievalConfig, VectorBackend};
use contractlens_core::error::RetrievalError;
use contractlens_core::retrieval::VectorStore;
use tracing::info;

use crate::in_memory::InMemoryVectorStore;
use crate::pinecone::PineconeVectorStore;

/// Build the configured store. The pgvector backend connects and migrates
/// before returning.
pub async fn build_vector_store(
    config: &RetrievalConfig,
) -> Result<Arc<dyn VectorStore>, RetrievalError> {
    let store: Arc<dyn VectorStore> = match config.backend {
        VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
        VectorBackend::Pinecone => {
            let pinecone = config
                .pinecone
                .as_ref()
                .ok_or_else(|| {
                    RetrievalError::Config(
                        "backend = \"pinecone\" requires a [retrieval.pinecone] table".into(),
                    )
                })?;
            Arc::new(PineconeVectorStore::from_config(pinecone)?)
        }
        VectorBackend::Pgvector => connect_pgvector(config).await?,
    };
    info!(backend = %config.backend, store = store.name(), "Vector store ready");
    Ok(store)
}

#[cfg(feature = "postgres")]
async fn connect_pgvector(
    config: &RetrievalConfig,
) -> Result<Arc<dyn VectorStore>, RetrievalError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| {
            RetrievalError::Config(
                "backend = \"pgvector\" requires database_url (or DATABASE_URL)".into(),
            )
        })?;
    let store =
        crate::pgvector::PgVectorStore::connect(url, &config.pg_table, config.dimensions).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_pgvector(
    _config: &RetrievalConfig,
) -> Result<Arc<dyn VectorStore>, RetrievalError> {
    Err(RetrievalError::Config(
        "the pgvector backend needs a build with the `postgres` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractlens_config::PineconeConfig;

    #[tokio::test]
    async fn memory_is_the_default() {
        let store = build_vector_store(&RetrievalConfig::default()).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn pinecone_needs_its_table_and_key() {
        let mut config = RetrievalConfig { backend: VectorBackend::Pinecone, ..Default::default() };
        assert!(matches!(build_vector_store(&config).await, Err(RetrievalError::Config(_))));

        config.pinecone = Some(PineconeConfig {
            index_host: "contracts-abc.svc.pinecone.io".into(),
            api_key: Some("pc-key".into()),
            namespace: String::new(),
        });
        let store = build_vector_store(&config).await.unwrap();
        assert_eq!(store.name(), "pinecone");
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn pgvector_without_feature_is_a_config_error() {
        let config = RetrievalConfig {
            backend: VectorBackend::Pgvector,
            database_url: Some("postgres://localhost/contracts".into()),
            ..Default::default()
        };
        assert!(matches!(build_vector_store(&config).await, Err(RetrievalError::Config(_))));
    }
}
