//! Lists the contracts that have been ingested, so the model can scope searches.

use std::sync::Arc;

use async_trait::async_trait;
use contractlens_core::error::ToolError;
use contractlens_core::tool::{Tool, ToolResult};
use contractlens_retrieval::DocumentCatalog;
use serde_json::{Value, json};

pub struct ListDocumentsTool {
    catalog: Arc<DocumentCatalog>,
}

impl ListDocumentsTool {
    pub fn new(catalog: Arc<DocumentCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ListDocumentsTool {
    fn name(&self) -> &str {
        "list_documents"
    }

    fn description(&self) -> &str {
        "List the ingested contracts with their document_id, title and size."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        let documents = self.catalog.list().await;
        if documents.is_empty() {
            return Ok(ToolResult::ok("No documents have been ingested yet.").with_data(json!([])));
        }

        let data = serde_json::to_value(&documents).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "list_documents".into(),
            reason: e.to_string(),
        })?;
        let output = serde_json::to_string_pretty(&data).unwrap_or_default();
        Ok(ToolResult::ok(output).with_data(data))
    }
}
