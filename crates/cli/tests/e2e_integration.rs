//! End-to-end tests: HTTP request in, agent run with real tools over a real
//! retrieval pipeline, answer out. Only the LLM is scripted.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use contractlens_agent::testing::{ScriptedProvider, text_response, tool_call, tool_call_response};
use contractlens_agent::{ConversationStore, Executor, StopReason};
use contractlens_config::AppConfig;
use contractlens_core::event::EventBus;
use contractlens_core::message::{Conversation, Role};
use contractlens_gateway::api_v1::{ChatResponse, StatusResponse};
use contractlens_gateway::{ApiV1State, SharedApiState, build_router};
use contractlens_retrieval::testing::KeywordEmbedder;
use contractlens_retrieval::{
    DocumentCatalog, IngestReport, Ingestor, RetrievalClient, build_vector_store,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

const LEASE: &str = "COMMERCIAL LEASE\n\n\
    1. Rent. Tenant pays rent of 4,000 dollars on the first day of each month.\n\n\
    2. Termination. Either party may terminate this lease with ninety days written notice.\n\n\
    3. Insurance. Tenant maintains liability insurance of one million dollars.";

// ── Harness ──────────────────────────────────────────────────────────────

/// Wire the runtime the way `contractlens serve` does, from a config file.
async fn runtime(config: &AppConfig, provider: Arc<ScriptedProvider>) -> SharedApiState {
    let embedder = Arc::new(KeywordEmbedder::new());
    let store = build_vector_store(&config.retrieval).await.unwrap();
    let catalog = Arc::new(DocumentCatalog::new());
    let event_bus = Arc::new(EventBus::default());

    let retrieval = Arc::new(RetrievalClient::from_config(
        embedder.clone(),
        store.clone(),
        &config.retrieval,
    ));
    let ingestor = Arc::new(
        Ingestor::from_config(&config.ingestion, embedder, "kw", store, catalog.clone())
            .unwrap()
            .with_events(event_bus.clone()),
    );
    let tools = Arc::new(contractlens_tools::default_registry(
        retrieval.clone(),
        catalog,
        Duration::from_secs(config.agent.tool_timeout_secs),
    ));
    let executor = Arc::new(Executor::from_config(config, provider, tools, event_bus.clone()));

    Arc::new(ApiV1State::new(
        executor,
        Arc::new(ConversationStore::from_config(&config.conversation)),
        retrieval,
        ingestor,
        event_bus,
    ))
}

fn config_from_toml(toml: &str) -> AppConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml).unwrap();
    AppConfig::load(Some(&path)).unwrap()
}

fn default_config() -> AppConfig {
    config_from_toml(
        r#"
default_model = "mock-model"

[ingestion]
chunk_size = 120
chunk_overlap = 0

[retrieval]
similarity_threshold = 0.0
"#,
    )
}

async fn call(app: &axum::Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_ingest_then_answer_from_retrieved_clause() {
    let config = default_config();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_response(vec![tool_call(
            "call_1",
            "search_contract",
            json!({"query": "terminate notice"}),
        )]),
        text_response("Either party may terminate with ninety days written notice (clause 2)."),
    ]));
    let state = runtime(&config, provider.clone()).await;
    let app = build_router(state.clone(), &config.gateway);

    let (status, body) = call(
        &app,
        post_json(
            "/v1/documents",
            json!({"title": "Lease", "text": LEASE, "document_id": "lease"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let report: IngestReport = serde_json::from_slice(&body).unwrap();
    assert!(report.chunk_count >= 3);

    let (status, body) = call(
        &app,
        post_json(
            "/v1/chat",
            json!({"conversation_id": "tenant-1", "message": "How do I end the lease?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(chat.conversation_id, "tenant-1");
    assert_eq!(chat.stop_reason, StopReason::Completed);
    assert_eq!(chat.iterations, 2);
    assert_eq!(chat.tool_calls.len(), 1);
    assert!(chat.tool_calls[0].success);
    assert!(chat.answer.contains("ninety days"));

    // The model saw the retrieved clause as the tool result
    let requests = provider.requests();
    let tool_result = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result fed back");
    assert!(tool_result.content.contains("terminate this lease"));
    assert!(tool_result.content.contains("\"lease\""));

    let (status, body) = call(&app, get("/v1/conversations/tenant-1")).await;
    assert_eq!(status, StatusCode::OK);
    let conversation: Conversation = serde_json::from_slice(&body).unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn e2e_history_carries_into_the_next_turn() {
    let config = default_config();
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("Rent is 4,000 dollars a month."),
        text_response("That is 48,000 dollars a year."),
    ]));
    let state = runtime(&config, provider.clone()).await;
    let app = build_router(state, &config.gateway);

    for message in ["What is the rent?", "And per year?"] {
        let (status, _) = call(
            &app,
            post_json("/v1/chat", json!({"conversation_id": "s", "message": message})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let second = &provider.requests()[1];
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert!(contents.contains(&"What is the rent?"));
    assert!(contents.contains(&"Rent is 4,000 dollars a month."));
    assert_eq!(contents.last(), Some(&"And per year?"));
}

#[tokio::test]
async fn e2e_tool_call_ceiling_forces_final_answer() {
    let config = config_from_toml(
        r#"
[agent]
max_iterations = 10
max_tool_calls = 2
"#,
    );
    let search = |id: &str| tool_call(id, "search_contract", json!({"query": "insurance"}));
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_response(vec![search("a")]),
        tool_call_response(vec![search("b")]),
        text_response("Liability insurance of one million dollars, as far as I could check."),
    ]));
    let state = runtime(&config, provider.clone()).await;
    let app = build_router(state, &config.gateway);

    let (status, body) = call(
        &app,
        post_json("/v1/chat", json!({"message": "What insurance is required?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(chat.stop_reason, StopReason::CallLimit);
    assert_eq!(chat.tool_calls.len(), 2);
    assert!(!chat.conversation_id.is_empty());

    // The forced final call offers no tools
    let last = provider.requests().pop().unwrap();
    assert!(last.tools.is_empty());
}

#[tokio::test]
async fn e2e_provider_failure_is_bad_gateway_and_not_stored() {
    let config = default_config();
    let provider = Arc::new(ScriptedProvider::failing(
        contractlens_core::error::ProviderError::Network("connection reset".into()),
    ));
    let state = runtime(&config, provider).await;
    let app = build_router(state.clone(), &config.gateway);

    let (status, body) = call(
        &app,
        post_json("/v1/chat", json!({"conversation_id": "x", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("connection reset"));

    assert!(state.conversations.is_empty().await);
    let (status, _) = call(&app, get("/v1/conversations/x")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn e2e_status_reflects_event_counters() {
    let config = default_config();
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("Noted.")]));
    let state = runtime(&config, provider).await;
    let counter = contractlens_gateway::status::spawn_event_counter(
        &state.event_bus,
        state.counters.clone(),
    );
    let app = build_router(state.clone(), &config.gateway);

    call(&app, post_json("/v1/documents", json!({"title": "Lease", "text": LEASE}))).await;
    call(&app, post_json("/v1/chat", json!({"message": "Summarize"}))).await;

    // let the counter task drain the bus
    for _ in 0..10 {
        tokio::task::yield_now().await;
        if state.counters.snapshot().responses == 1 {
            break;
        }
    }

    let (status, body) = call(&app, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let report: StatusResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.status, "healthy");
    assert_eq!(report.model, "mock-model");
    assert_eq!(report.documents, 1);
    assert_eq!(report.active_conversations, 1);
    assert_eq!(report.tools, 3);
    assert_eq!(report.counters.documents_ingested, 1);
    assert_eq!(report.counters.responses, 1);
    assert_eq!(report.counters.tokens_used, 15);

    counter.abort();
}

#[tokio::test]
async fn e2e_document_lifecycle_scopes_search() {
    let config = default_config();
    let state = runtime(&config, Arc::new(ScriptedProvider::new(Vec::new()))).await;
    let app = build_router(state, &config.gateway);

    call(
        &app,
        post_json(
            "/v1/documents",
            json!({"title": "Lease", "text": LEASE, "document_id": "lease"}),
        ),
    )
    .await;
    call(
        &app,
        post_json(
            "/v1/documents",
            json!({
                "title": "NDA",
                "text": "Confidential information must not be disclosed. \
                         Either party may terminate on notice.",
                "document_id": "nda",
            }),
        ),
    )
    .await;

    let (_, body) = call(
        &app,
        post_json("/v1/search", json!({"query": "terminate", "document_id": "nda"})),
    )
    .await;
    let hits: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let results = hits["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r["document_id"] == "nda"));

    let delete = Request::builder()
        .method("DELETE")
        .uri("/v1/documents/nda")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = call(&app, get("/v1/documents")).await;
    let listing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["documents"][0]["document_id"], "lease");
}
