//! Ingestion pipeline: split → embed in batches → upsert → catalog.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use contractlens_config::IngestionConfig;
use contractlens_core::error::RetrievalError;
use contractlens_core::event::{DomainEvent, EventBus};
use contractlens_core::provider::Provider;
use contractlens_core::retrieval::{ChunkRecord, DocumentInfo, VectorStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::DocumentCatalog;
use crate::client::embed_texts;
use crate::splitter::TextSplitter;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub title: String,
    pub text: String,
    /// Reusing an id replaces that document's chunks.
    #[serde(default)]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub title: String,
    pub chunk_count: usize,
    pub char_count: usize,
    /// True when an earlier version of the document was replaced
    pub replaced: bool,
}

pub struct Ingestor {
    splitter: TextSplitter,
    embedder: Arc<dyn Provider>,
    embedding_model: String,
    store: Arc<dyn VectorStore>,
    catalog: Arc<DocumentCatalog>,
    batch_size: usize,
    events: Option<Arc<EventBus>>,
    /// Serializes ingest and remove per document id
    document_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Ingestor {
    pub fn new(
        splitter: TextSplitter,
        embedder: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
        store: Arc<dyn VectorStore>,
        catalog: Arc<DocumentCatalog>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            embedding_model: embedding_model.into(),
            store,
            catalog,
            batch_size: 64,
            events: None,
            document_locks: Mutex::default(),
        }
    }

    pub fn from_config(
        config: &IngestionConfig,
        embedder: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
        store: Arc<dyn VectorStore>,
        catalog: Arc<DocumentCatalog>,
    ) -> Result<Self, RetrievalError> {
        let splitter = TextSplitter::from_config(config)?;
        Ok(Self::new(splitter, embedder, embedding_model, store, catalog)
            .with_batch_size(config.embed_batch_size))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn catalog(&self) -> &Arc<DocumentCatalog> {
        &self.catalog
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport, RetrievalError> {
        let title = match request.title.trim() {
            "" => "Untitled".to_string(),
            t => t.to_string(),
        };
        if request.text.trim().is_empty() {
            return Err(RetrievalError::EmptyDocument(title));
        }

        let document_id = request
            .document_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| generate_document_id(&title));

        let chunks = self.splitter.split(&request.text);
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument(title));
        }

        let lock = self.document_lock(&document_id).await;
        let _guard = lock.lock().await;
        let previous = self.catalog.get(&document_id).await;

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let vectors =
                embed_texts(self.embedder.as_ref(), &self.embedding_model, batch.to_vec()).await?;
            embeddings.extend(vectors);
            debug!(
                document_id = %document_id,
                embedded = embeddings.len(),
                total = chunks.len(),
                "Embedded batch"
            );
        }

        let chunk_count = chunks.len();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| ChunkRecord {
                id: ChunkRecord::chunk_id(&document_id, index),
                document_id: document_id.clone(),
                title: title.clone(),
                chunk_index: index,
                text,
                embedding,
            })
            .collect();

        self.store.upsert(records).await?;

        // Upsert already overwrote ids that still exist; drop the tail the
        // new version no longer has.
        if let Some(prev) = &previous
            && prev.chunk_count > chunk_count
        {
            let stale: Vec<String> = (chunk_count..prev.chunk_count)
                .map(|i| ChunkRecord::chunk_id(&document_id, i))
                .collect();
            self.store.delete(&stale).await?;
        }

        let char_count = request.text.chars().count();
        self.catalog
            .insert(DocumentInfo {
                document_id: document_id.clone(),
                title: title.clone(),
                chunk_count,
                char_count,
                ingested_at: Utc::now(),
            })
            .await;

        if let Some(events) = &self.events {
            events.publish(DomainEvent::DocumentIngested {
                document_id: document_id.clone(),
                chunk_count,
                timestamp: Utc::now(),
            });
        }

        info!(
            document_id = %document_id,
            chunks = chunk_count,
            chars = char_count,
            store = self.store.name(),
            replaced = previous.is_some(),
            "Document ingested"
        );

        Ok(IngestReport {
            document_id,
            title,
            chunk_count,
            char_count,
            replaced: previous.is_some(),
        })
    }

    /// Delete a document's chunks and catalog entry.
    pub async fn remove(&self, document_id: &str) -> Result<DocumentInfo, RetrievalError> {
        let lock = self.document_lock(document_id).await;
        let _guard = lock.lock().await;

        let info = self
            .catalog
            .get(document_id)
            .await
            .ok_or_else(|| RetrievalError::NotFound(document_id.to_string()))?;

        let ids: Vec<String> = (0..info.chunk_count)
            .map(|i| ChunkRecord::chunk_id(document_id, i))
            .collect();
        self.store.delete(&ids).await?;
        self.catalog.remove(document_id).await;

        info!(document_id, chunks = info.chunk_count, "Document removed");
        Ok(info)
    }

    async fn document_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.document_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(document_id.to_string()).or_default().clone()
    }
}

/// `"{slug}-{8 hex chars}"`, e.g. `master-services-agreement-1a2b3c4d`.
fn generate_document_id(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    if slug.is_empty() {
        format!("doc-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryVectorStore;
    use crate::testing::{FailingEmbedder, KeywordEmbedder};
    use contractlens_config::ChunkingStrategy;
    use contractlens_core::retrieval::ChunkFilter;

    struct Fixture {
        ingestor: Ingestor,
        store: Arc<InMemoryVectorStore>,
        embedder: Arc<KeywordEmbedder>,
    }

    fn fixture(chunk_size: usize, batch_size: usize) -> Fixture {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(KeywordEmbedder::new());
        let splitter = TextSplitter::new(chunk_size, 0, ChunkingStrategy::Recursive).unwrap();
        let ingestor = Ingestor::new(
            splitter,
            embedder.clone(),
            "kw",
            store.clone(),
            Arc::new(DocumentCatalog::new()),
        )
        .with_batch_size(batch_size);
        Fixture { ingestor, store, embedder }
    }

    fn request(text: &str, id: Option<&str>) -> IngestRequest {
        IngestRequest {
            title: "Services Agreement".into(),
            text: text.into(),
            document_id: id.map(String::from),
        }
    }

    const FOUR_PARAGRAPHS: &str = "Payment is due in thirty days.\n\nLate fees accrue monthly.\n\n\
                                   The term is one year.\n\nNotices go to the legal department.";

    #[tokio::test]
    async fn ingest_chunks_embeds_and_catalogs() {
        let f = fixture(40, 3);
        let report = f.ingestor.ingest(request(FOUR_PARAGRAPHS, Some("sa-1"))).await.unwrap();

        assert_eq!(report.document_id, "sa-1");
        assert_eq!(report.chunk_count, 4);
        assert!(!report.replaced);
        assert_eq!(f.store.len().await, 4);
        // 4 chunks in batches of 3
        assert_eq!(f.embedder.calls(), 2);

        let info = f.ingestor.catalog().get("sa-1").await.unwrap();
        assert_eq!(info.chunk_count, 4);
        assert_eq!(info.title, "Services Agreement");

        let hits = f
            .store
            .query(&KeywordEmbedder::vector("late fees"), 1, &ChunkFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].id, "sa-1#1");
    }

    #[tokio::test]
    async fn reingest_replaces_and_drops_stale_chunks() {
        let f = fixture(40, 10);
        f.ingestor.ingest(request(FOUR_PARAGRAPHS, Some("sa-1"))).await.unwrap();
        let report = f
            .ingestor
            .ingest(request("Payment is due in sixty days.", Some("sa-1")))
            .await
            .unwrap();

        assert!(report.replaced);
        assert_eq!(report.chunk_count, 1);
        assert_eq!(f.store.len().await, 1);
        assert_eq!(f.ingestor.catalog().len().await, 1);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let f = fixture(40, 10);
        let err = f.ingestor.ingest(request(" \n ", None)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyDocument(_)));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn generated_ids_come_from_title() {
        let f = fixture(100, 10);
        let report = f.ingestor.ingest(request("Short contract.", None)).await.unwrap();
        assert!(report.document_id.starts_with("services-agreement-"));
        assert_eq!(report.document_id.len(), "services-agreement-".len() + 8);
        assert_eq!(generate_document_id("§§§").len(), "doc-".len() + 8);
    }

    #[tokio::test]
    async fn embedding_failure_leaves_store_untouched() {
        let store = Arc::new(InMemoryVectorStore::new());
        let splitter = TextSplitter::new(100, 0, ChunkingStrategy::Fixed).unwrap();
        let ingestor = Ingestor::new(
            splitter,
            Arc::new(FailingEmbedder),
            "kw",
            store.clone(),
            Arc::new(DocumentCatalog::new()),
        );

        let err = ingestor.ingest(request("Some contract text.", None)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert!(store.is_empty().await);
        assert!(ingestor.catalog().is_empty().await);
    }

    #[tokio::test]
    async fn remove_deletes_chunks() {
        let f = fixture(40, 10);
        f.ingestor.ingest(request(FOUR_PARAGRAPHS, Some("sa-1"))).await.unwrap();
        let removed = f.ingestor.remove("sa-1").await.unwrap();
        assert_eq!(removed.chunk_count, 4);
        assert!(f.store.is_empty().await);

        let err = f.ingestor.remove("sa-1").await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_ingests_of_one_document_run_in_turn() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(KeywordEmbedder::with_delay(std::time::Duration::from_millis(50)));
        let splitter = TextSplitter::new(40, 0, ChunkingStrategy::Recursive).unwrap();
        let catalog = Arc::new(DocumentCatalog::new());
        let ingestor = Ingestor::new(splitter, embedder, "kw", store.clone(), catalog.clone());

        // The four-chunk version embeds slower; without serialization the
        // one-chunk version would land first and be overwritten.
        let (long, short) = tokio::join!(
            ingestor.ingest(request(FOUR_PARAGRAPHS, Some("sa-1"))),
            ingestor.ingest(request("Payment is due in sixty days.", Some("sa-1"))),
        );
        assert_eq!(long.unwrap().chunk_count, 4);
        assert!(short.unwrap().replaced);

        assert_eq!(store.len().await, 1);
        assert_eq!(catalog.get("sa-1").await.unwrap().chunk_count, 1);
        let hits = store
            .query(&KeywordEmbedder::vector("sixty days"), 4, &ChunkFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("sixty"));
        assert!(ingestor.document_locks.lock().await.values().all(|l| Arc::strong_count(l) == 1));
    }

    #[tokio::test]
    async fn ingestion_publishes_event() {
        let events = Arc::new(EventBus::new(8));
        let mut rx = events.subscribe();
        let f = fixture(100, 10);
        let ingestor = f.ingestor.with_events(events);
        ingestor.ingest(request("Short contract.", Some("x"))).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.as_ref(), DomainEvent::DocumentIngested { chunk_count: 1, .. }));
    }
}
