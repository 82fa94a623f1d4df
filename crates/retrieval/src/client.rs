//! The retrieval client: embed a query, fetch the nearest chunks, apply the
//! similarity threshold.

use std::sync::Arc;

use contractlens_config::RetrievalConfig;
use contractlens_core::error::RetrievalError;
use contractlens_core::provider::{EmbeddingRequest, Provider};
use contractlens_core::retrieval::{ChunkFilter, ScoredChunk, VectorStore};
use tracing::debug;

use crate::similarity::sort_by_score;

/// Hard ceiling on results per query, whatever the caller asks for.
pub const MAX_TOP_K: usize = 50;

pub struct RetrievalClient {
    embedder: Arc<dyn Provider>,
    store: Arc<dyn VectorStore>,
    embedding_model: String,
    top_k: usize,
    similarity_threshold: f32,
}

impl RetrievalClient {
    pub fn new(
        embedder: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            embedding_model: embedding_model.into(),
            top_k: 5,
            similarity_threshold: 0.0,
        }
    }

    pub fn from_config(
        embedder: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        config: &RetrievalConfig,
    ) -> Self {
        Self::new(embedder, store, &config.embedding_model)
            .with_top_k(config.top_k)
            .with_similarity_threshold(config.similarity_threshold)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.clamp(1, MAX_TOP_K);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Chunks relevant to `query`, best first, all at or above the threshold.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidQuery("query must not be empty".into()));
        }
        let top_k = top_k.unwrap_or(self.top_k).clamp(1, MAX_TOP_K);

        let mut vectors = embed_texts(
            self.embedder.as_ref(),
            &self.embedding_model,
            vec![query.to_string()],
        )
        .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned for query".into()))?;

        let mut results = self.store.query(&vector, top_k, filter).await?;
        let fetched = results.len();
        results.retain(|c| c.score >= self.similarity_threshold);
        sort_by_score(&mut results);

        debug!(
            store = self.store.name(),
            top_k,
            fetched,
            kept = results.len(),
            threshold = self.similarity_threshold,
            "Retrieved chunks"
        );
        Ok(results)
    }
}

/// Embed `inputs` in one request, checking one vector comes back per input.
pub async fn embed_texts(
    embedder: &dyn Provider,
    model: &str,
    inputs: Vec<String>,
) -> Result<Vec<Vec<f32>>, RetrievalError> {
    let expected = inputs.len();
    let response = embedder
        .embed(EmbeddingRequest { model: model.to_string(), inputs })
        .await?;
    if response.embeddings.len() != expected {
        return Err(RetrievalError::Embedding(format!(
            "expected {expected} embeddings, provider returned {}",
            response.embeddings.len()
        )));
    }
    Ok(response.embeddings)
}
