//! Contract search tool: semantic retrieval over ingested contract chunks.

use std::sync::Arc;

use async_trait::async_trait;
use contractlens_core::error::{RetrievalError, ToolError};
use contractlens_core::retrieval::ChunkFilter;
use contractlens_core::tool::{Tool, ToolResult};
use contractlens_retrieval::{MAX_TOP_K, RetrievalClient};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

pub struct SearchContractTool {
    client: Arc<RetrievalClient>,
}

impl SearchContractTool {
    pub fn new(client: Arc<RetrievalClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct Passage<'a> {
    document_id: &'a str,
    title: &'a str,
    chunk_index: usize,
    score: f32,
    text: &'a str,
}

#[async_trait]
impl Tool for SearchContractTool {
    fn name(&self) -> &str {
        "search_contract"
    }

    fn description(&self) -> &str {
        "Search the ingested contracts for passages relevant to a question. \
         Returns matching passages with their document, position and similarity score. \
         Quote these passages when answering."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description":
                        "What to look for, e.g. 'termination for convenience notice period'"
                },
                "top_k": {
                    "type": "integer",
                    "description": format!("Maximum number of passages (1-{MAX_TOP_K})")
                },
                "document_id": {
                    "type": "string",
                    "description": "Restrict the search to one document (see list_documents)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let top_k = arguments["top_k"]
            .as_u64()
            .or_else(|| arguments["top_k"].as_f64().map(|f| f.max(0.0) as u64))
            .map(|k| k as usize);
        let filter = match arguments["document_id"].as_str() {
            Some(id) if !id.trim().is_empty() => ChunkFilter::document(id.trim()),
            _ => ChunkFilter::default(),
        };

        let chunks = self
            .client
            .retrieve(query, top_k, &filter)
            .await
            .map_err(|e| match e {
                RetrievalError::InvalidQuery(msg) => ToolError::InvalidArguments(msg),
                other => ToolError::ExecutionFailed {
                    tool_name: "search_contract".into(),
                    reason: other.to_string(),
                },
            })?;
        debug!(query, hits = chunks.len(), document_id = ?filter.document_id, "search_contract");

        let passages: Vec<Passage<'_>> = chunks
            .iter()
            .map(|c| Passage {
                document_id: &c.document_id,
                title: &c.title,
                chunk_index: c.chunk_index,
                score: c.score,
                text: &c.text,
            })
            .collect();
        let data = serde_json::to_value(&passages).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "search_contract".into(),
            reason: e.to_string(),
        })?;
        let output = format!("{data:#}");

        Ok(ToolResult::ok(output).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractlens_config::ChunkingStrategy;
    use contractlens_retrieval::testing::{FailingEmbedder, KeywordEmbedder};
    use contractlens_retrieval::{
        DocumentCatalog, InMemoryVectorStore, IngestRequest, Ingestor, TextSplitter,
    };

    async fn tool_with_contracts() -> SearchContractTool {
        let embedder = Arc::new(KeywordEmbedder::new());
        let store = Arc::new(InMemoryVectorStore::new());
        let splitter = TextSplitter::new(200, 0, ChunkingStrategy::Recursive).unwrap();
        let ingestor = Ingestor::new(
            splitter,
            embedder.clone(),
            "kw",
            store.clone(),
            Arc::new(DocumentCatalog::new()),
        );
        ingestor
            .ingest(IngestRequest {
                title: "Lease".into(),
                text: "The tenant pays rent monthly.\n\n\
                       Either party may terminate with ninety days notice."
                    .into(),
                document_id: Some("lease".into()),
            })
            .await
            .unwrap();
        ingestor
            .ingest(IngestRequest {
                title: "NDA".into(),
                text: "Confidential information must not be disclosed to third parties.".into(),
                document_id: Some("nda".into()),
            })
            .await
            .unwrap();
        SearchContractTool::new(Arc::new(RetrievalClient::new(embedder, store, "kw")))
    }

    #[tokio::test]
    async fn returns_ranked_passages() {
        let tool = tool_with_contracts().await;
        let result = tool
            .execute(json!({"query": "terminate notice", "top_k": 2}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        let passages = data.as_array().unwrap();
        assert!(passages.len() <= 2);
        assert_eq!(passages[0]["document_id"], "lease");
        assert!(passages[0]["text"].as_str().unwrap().contains("ninety days"));
        assert!(result.output.contains("\"score\""));
    }

    #[tokio::test]
    async fn document_filter_restricts_results() {
        let tool = tool_with_contracts().await;
        let result = tool
            .execute(json!({"query": "confidential information", "document_id": "lease"}))
            .await
            .unwrap();
        let data = result.data.unwrap();
        assert!(data.as_array().unwrap().iter().all(|p| p["document_id"] == "lease"));
    }

    #[tokio::test]
    async fn blank_query_is_invalid_arguments() {
        let tool = tool_with_contracts().await;
        let err = tool.execute(json!({"query": "  "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn embedding_failure_is_execution_failure() {
        let tool = SearchContractTool::new(Arc::new(RetrievalClient::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "kw",
        )));
        let err = tool.execute(json!({"query": "rent"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn empty_corpus_returns_an_empty_array() {
        let tool = SearchContractTool::new(Arc::new(RetrievalClient::new(
            Arc::new(KeywordEmbedder::new()),
            Arc::new(InMemoryVectorStore::new()),
            "kw",
        )));
        let result = tool.execute(json!({"query": "rent"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "[]");
        assert_eq!(result.data, Some(json!([])));
    }
}
