//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`                   Ask a question, get an answer
//! - `GET    /v1/conversations`          List sessions
//! - `GET    /v1/conversations/{id}`     Messages of one session
//! - `DELETE /v1/conversations/{id}`     Forget a session
//! - `POST   /v1/documents`              Ingest contract text (JSON)
//! - `POST   /v1/documents/upload`       Ingest a text file (multipart)
//! - `GET    /v1/documents`              List ingested documents
//! - `DELETE /v1/documents/{id}`         Remove a document
//! - `POST   /v1/search`                 Semantic search over chunks
//! - `GET    /v1/tools`                  Tools offered to the model
//! - `GET    /v1/status`                 Runtime status and counters

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use contractlens_agent::{
    ConversationStore, ConversationSummary, Executor, StopReason, ToolInvocation,
};
use contractlens_core::event::EventBus;
use contractlens_core::message::{Conversation, ConversationId, Message};
use contractlens_core::provider::{ToolDefinition, Usage};
use contractlens_core::retrieval::{ChunkFilter, DocumentInfo, ScoredChunk};
use contractlens_retrieval::{IngestReport, IngestRequest, Ingestor, RetrievalClient};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::status::{CounterSnapshot, EventCounters};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub executor: Arc<Executor>,
    pub conversations: Arc<ConversationStore>,
    pub retrieval: Arc<RetrievalClient>,
    pub ingestor: Arc<Ingestor>,
    pub event_bus: Arc<EventBus>,
    pub counters: Arc<EventCounters>,
    pub start_time: DateTime<Utc>,
}

impl ApiV1State {
    pub fn new(
        executor: Arc<Executor>,
        conversations: Arc<ConversationStore>,
        retrieval: Arc<RetrievalClient>,
        ingestor: Arc<Ingestor>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            executor,
            conversations,
            retrieval,
            ingestor,
            event_bus,
            counters: Arc::new(EventCounters::default()),
            start_time: Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/conversations", get(list_conversations_handler))
        .route(
            "/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/documents", post(ingest_document_handler).get(list_documents_handler))
        .route("/documents/upload", post(upload_document_handler))
        .route("/documents/{id}", axum::routing::delete(delete_document_handler))
        .route("/search", post(search_handler))
        .route("/tools", get(list_tools_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing or caller-chosen session id; omitted means a new session.
    #[serde(default)]
    conversation_id: Option<String>,
    message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub answer: String,
    pub stop_reason: StopReason,
    pub iterations: u32,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Usage,
}

async fn chat_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let id = payload
        .conversation_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(ConversationId::from)
        .unwrap_or_default();
    info!(conversation_id = %id, message_len = payload.message.len(), "v1/chat request");

    // One turn at a time per session: history read, run and store happen
    // under the same guard.
    let lock = state.conversations.turn_lock(&id).await;
    let _turn = lock.lock().await;

    let history = state.conversations.history(&id).await;
    let outcome = state.executor.run(&id, &history, &payload.message).await?;

    state.conversations.append(&id, Message::user(&payload.message)).await;
    state.conversations.append(&id, Message::assistant(&outcome.answer)).await;

    Ok(Json(ChatResponse {
        conversation_id: id.to_string(),
        answer: outcome.answer,
        stop_reason: outcome.stop_reason,
        iterations: outcome.iterations,
        tool_calls: outcome.tool_calls,
        usage: outcome.usage,
    }))
}

// ── Conversations ─────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub count: usize,
}

async fn list_conversations_handler(
    State(state): State<SharedApiState>,
) -> Json<ConversationListResponse> {
    let conversations = state.conversations.list().await;
    Json(ConversationListResponse { count: conversations.len(), conversations })
}

async fn get_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    state
        .conversations
        .get(&ConversationId::from(id.as_str()))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("conversation '{id}' not found")))
}

async fn delete_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.conversations.remove(&ConversationId::from(id.as_str())).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("conversation '{id}' not found")))
    }
}

// ── Documents ─────────────────────────────────────────────────────────────

async fn ingest_document_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestReport>), ApiError> {
    let Json(request) = payload?;
    let report = state.ingestor.ingest(request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Multipart upload: a `file` part plus optional `title` and `document_id`.
/// Only UTF-8 text is accepted; binary formats need extracting first.
async fn upload_document_handler(
    State(state): State<SharedApiState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestReport>), ApiError> {
    let mut file: Option<(String, String)> = None;
    let mut title: Option<String> = None;
    let mut document_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.txt").to_string();
                let content_type = field.content_type().map(str::to_string);
                if !is_text_upload(&file_name, content_type.as_deref()) {
                    return Err(ApiError::UnsupportedMediaType(format!(
                        "'{file_name}' ({}) is not a text file; \
                         extract its text and POST /v1/documents instead",
                        content_type.as_deref().unwrap_or("unknown type")
                    )));
                }
                let bytes = field.bytes().await?;
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    ApiError::UnsupportedMediaType(format!("'{file_name}' is not valid UTF-8 text"))
                })?;
                file = Some((file_name, text));
            }
            "title" => title = field.text().await.ok(),
            "document_id" => document_id = field.text().await.ok(),
            _ => {}
        }
    }

    let (file_name, text) =
        file.ok_or_else(|| ApiError::BadRequest("multipart field 'file' is required".into()))?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_stem(&file_name).to_string());

    let report = state
        .ingestor
        .ingest(IngestRequest { title, text, document_id })
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

fn is_text_upload(file_name: &str, content_type: Option<&str>) -> bool {
    let lower = file_name.to_ascii_lowercase();
    content_type.is_some_and(|ct| ct.starts_with("text/"))
        || lower.ends_with(".txt")
        || lower.ends_with(".md")
}

fn file_stem(file_name: &str) -> &str {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

#[derive(Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentInfo>,
    pub count: usize,
}

async fn list_documents_handler(State(state): State<SharedApiState>) -> Json<DocumentListResponse> {
    let documents = state.ingestor.catalog().list().await;
    Json(DocumentListResponse { count: documents.len(), documents })
}

async fn delete_document_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.ingestor.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Search ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    document_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredChunk>,
}

async fn search_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;
    let filter = ChunkFilter { document_id: request.document_id };
    let results = state.retrieval.retrieve(&request.query, request.top_k, &filter).await?;
    Ok(Json(SearchResponse { query: request.query, results }))
}

// ── Tools ─────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
    pub count: usize,
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let tools = state.executor.tools().definitions();
    Json(ToolListResponse { count: tools.len(), tools })
}

// ── Status ────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub provider: String,
    pub model: String,
    pub vector_store: String,
    pub active_conversations: usize,
    pub documents: usize,
    pub tools: usize,
    pub counters: CounterSnapshot,
}

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    let uptime = Utc::now().signed_duration_since(state.start_time).num_seconds().max(0) as u64;

    Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        provider: state.executor.provider_name().into(),
        model: state.executor.model().into(),
        vector_store: state.retrieval.store().name().into(),
        active_conversations: state.conversations.len().await,
        documents: state.ingestor.catalog().len().await,
        tools: state.executor.tools().len(),
        counters: state.counters.snapshot(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
