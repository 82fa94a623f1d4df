//! In-process registry of ingested documents.

use std::collections::HashMap;

use contractlens_core::retrieval::DocumentInfo;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct DocumentCatalog {
    documents: RwLock<HashMap<String, DocumentInfo>>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous entry.
    pub async fn insert(&self, info: DocumentInfo) -> Option<DocumentInfo> {
        self.documents.write().await.insert(info.document_id.clone(), info)
    }

    pub async fn get(&self, document_id: &str) -> Option<DocumentInfo> {
        self.documents.read().await.get(document_id).cloned()
    }

    pub async fn remove(&self, document_id: &str) -> Option<DocumentInfo> {
        self.documents.write().await.remove(document_id)
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<DocumentInfo> {
        let mut docs: Vec<DocumentInfo> = self.documents.read().await.values().cloned().collect();
        docs.sort_by(|a, b| {
            b.ingested_at
                .cmp(&a.ingested_at)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        docs
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}
