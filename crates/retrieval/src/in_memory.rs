//! In-memory vector store: brute-force cosine search.
//!
//! The default backend. Good for tests, demos and small contract sets;
//! everything is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use contractlens_core::error::RetrievalError;
use contractlens_core::retrieval::{ChunkFilter, ChunkRecord, ScoredChunk, VectorStore};
use tokio::sync::RwLock;

use crate::similarity::{cosine_similarity, sort_by_score};

pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RetrievalError> {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let map = self.records.read().await;

        let mut scored: Vec<ScoredChunk> = map
            .values()
            .filter(|r| filter.matches(&r.document_id))
            .map(|r| ScoredChunk {
                id: r.id.clone(),
                document_id: r.document_id.clone(),
                title: r.title.clone(),
                chunk_index: r.chunk_index,
                text: r.text.clone(),
                score: cosine_similarity(&r.embedding, vector),
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError> {
        let mut map = self.records.write().await;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }
}
