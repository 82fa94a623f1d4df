//! Vector store abstraction and the records that flow through it.
//!
//! A contract is split into chunks, each chunk is embedded, and the
//! resulting [`ChunkRecord`]s are written to a [`VectorStore`]. Queries come
//! back as [`ScoredChunk`]s, highest similarity first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// One embedded piece of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `"{document_id}#{chunk_index}"`
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
        format!("{document_id}#{chunk_index}")
    }
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Restricts a query to part of the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl ChunkFilter {
    pub fn document(id: impl Into<String>) -> Self {
        Self { document_id: Some(id.into()) }
    }

    pub fn matches(&self, record_document_id: &str) -> bool {
        self.document_id.as_deref().is_none_or(|id| id == record_document_id)
    }
}

/// Catalog entry for an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub title: String,
    pub chunk_count: usize,
    pub char_count: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Nearest-neighbour storage for chunk embeddings.
///
/// Implementations: in-memory, Pinecone, PostgreSQL + pgvector.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or replace records by id.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> std::result::Result<(), RetrievalError>;

    /// The `top_k` records closest to `vector`, best first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> std::result::Result<Vec<ScoredChunk>, RetrievalError>;

    /// Remove records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> std::result::Result<(), RetrievalError>;

    async fn health_check(&self) -> std::result::Result<bool, RetrievalError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_stable() {
        assert_eq!(ChunkRecord::chunk_id("msa-2024", 3), "msa-2024#3");
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ChunkFilter::default().matches("any"));
        assert!(ChunkFilter::document("nda").matches("nda"));
        assert!(!ChunkFilter::document("nda").matches("msa"));
    }
}
