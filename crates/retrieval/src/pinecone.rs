//! Pinecone vector store over the data-plane REST API.
//!
//! Chunk text and provenance travel as vector metadata, so a query returns
//! everything the retrieval client needs without a second lookup.

use std::time::Duration;

use async_trait::async_trait;
use contractlens_config::PineconeConfig;
use contractlens_core::error::RetrievalError;
use contractlens_core::retrieval::{ChunkFilter, ChunkRecord, ScoredChunk, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const API_VERSION: &str = "2024-07";
/// Pinecone caps upsert requests; 100 vectors of 1536 floats stays well under.
const UPSERT_BATCH: usize = 100;

pub struct PineconeVectorStore {
    index_host: String,
    api_key: String,
    namespace: String,
    client: reqwest::Client,
}

impl PineconeVectorStore {
    pub fn new(index_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    "Failed to build Pinecone HTTP client; requests will have no timeout"
                );
                reqwest::Client::new()
            });

        let mut host: String = index_host.into();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            host = format!("https://{host}");
        }

        Self {
            index_host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: String::new(),
            client,
        }
    }

    pub fn from_config(config: &PineconeConfig) -> Result<Self, RetrievalError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| {
                RetrievalError::Config("pinecone api_key (or PINECONE_API_KEY) is not set".into())
            })?;
        Ok(Self::new(&config.index_host, api_key).with_namespace(&config.namespace))
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, RetrievalError> {
        let url = format!("{}{path}", self.index_host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Store(format!("pinecone request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, path, "Pinecone returned error");
        Err(RetrievalError::Store(format!("pinecone {path} failed ({status}): {body}")))
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RetrievalError> {
        for batch in records.chunks(UPSERT_BATCH) {
            let vectors: Vec<PineconeVector<'_>> = batch
                .iter()
                .map(|r| PineconeVector {
                    id: &r.id,
                    values: &r.embedding,
                    metadata: ChunkMetadata {
                        document_id: r.document_id.clone(),
                        title: r.title.clone(),
                        chunk_index: r.chunk_index,
                        text: r.text.clone(),
                    },
                })
                .collect();

            self.post(
                "/vectors/upsert",
                json!({ "vectors": vectors, "namespace": self.namespace }),
            )
            .await?;
            debug!(
                count = batch.len(),
                namespace = %self.namespace,
                "Upserted vectors to Pinecone"
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
            "namespace": self.namespace,
        });
        if let Some(document_id) = &filter.document_id {
            body["filter"] = json!({ "document_id": { "$eq": document_id } });
        }

        let response: QueryResponse = self
            .post("/query", body)
            .await?
            .json()
            .await
            .map_err(|e| RetrievalError::Store(format!("malformed pinecone query response: {e}")))?;

        Ok(response
            .matches
            .into_iter()
            .filter_map(|m| {
                let meta = m.metadata?;
                Some(ScoredChunk {
                    id: m.id,
                    document_id: meta.document_id,
                    title: meta.title,
                    chunk_index: meta.chunk_index,
                    text: meta.text,
                    score: m.score,
                })
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError> {
        if ids.is_empty() {
            return Ok(());
        }
        for batch in ids.chunks(1000) {
            self.post("/vectors/delete", json!({ "ids": batch, "namespace": self.namespace }))
                .await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        let response = self.post("/describe_index_stats", json!({})).await;
        Ok(response.is_ok())
    }
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: ChunkMetadata,
}

#[derive(Serialize, Deserialize)]
struct ChunkMetadata {
    document_id: String,
    title: String,
    chunk_index: usize,
    text: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}
