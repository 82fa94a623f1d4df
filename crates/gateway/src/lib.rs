//! HTTP API gateway for ContractLens.
//!
//! Exposes a health check and the v1 API (chat, conversations, documents,
//! search, tools, status) over Axum.

pub mod api_v1;
pub mod error;
pub mod status;

use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use contractlens_config::{ConversationConfig, GatewayConfig};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use api_v1::{ApiV1State, SharedApiState, v1_router};
pub use error::ApiError;

/// How often idle sessions are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the full router: `/health` plus the v1 API under `/v1`.
///
/// Layers: request body limit (rejections rendered as JSON), CORS for the
/// configured origins, HTTP trace logging.
pub fn build_router(state: SharedApiState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1_router(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(middleware::map_response_with_state(
            config.max_body_bytes,
            json_payload_too_large,
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// `RequestBodyLimitLayer` answers a declared oversized body with a plain
/// text 413 before any handler runs.
async fn json_payload_too_large(State(limit): State<usize>, response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json {
        return response;
    }
    ApiError::PayloadTooLarge(format!("request body exceeds the {limit} byte limit"))
        .into_response()
}

/// An empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));
    if origins.is_empty() {
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Serve the gateway until Ctrl-C.
///
/// Also starts the event counter and the idle-session pruner.
pub async fn start(
    state: SharedApiState,
    gateway: &GatewayConfig,
    conversation: &ConversationConfig,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", gateway.host, gateway.port);

    let counter = status::spawn_event_counter(&state.event_bus, state.counters.clone());
    let pruner = status::spawn_idle_pruner(
        state.conversations.clone(),
        Duration::from_secs(conversation.idle_ttl_minutes.saturating_mul(60)),
        PRUNE_INTERVAL,
    );

    let app = build_router(state, gateway);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    counter.abort();
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; shutting down");
    }
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
