//! HTTP API for Maitred.
//!
//! Exposes liveness and health checks plus the `/ai` endpoints for
//! contextual chat, memory management and natural-language queries.
//!
//! Built on Axum.

pub mod ai;
pub mod error;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use maitred_assistant::Assistant;
use maitred_config::{AppConfig, GatewayConfig};

/// Shared application state.
pub struct AppState {
    pub assistant: Assistant,
    /// Include the rendered context in stateless chat responses.
    pub expose_context: bool,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(assistant: Assistant, gateway: &GatewayConfig) -> Self {
        Self {
            assistant,
            expose_context: gateway.expose_context,
            cors_origins: gateway.cors_origins.clone(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the router with all routes and layers.
///
/// Layers applied:
/// - CORS (any origin unless `cors_origins` is configured)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/ai/chat", post(ai::chat_handler))
        .route("/ai/clear", post(ai::clear_handler))
        .route("/ai/history", get(ai::history_handler))
        .route("/ai/query", post(ai::query_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("user-id")])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the HTTP server with production collaborators.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = Arc::new(maitred_providers::OpenAiCompatProvider::from_config(&config)?);
    let data = Arc::new(maitred_database::PostgresDataSource::from_config(&config)?);
    let store = maitred_memory::build_store(&config.memory);

    let assistant = Assistant::new(&config, provider, data, store);
    let state = Arc::new(AppState::new(assistant, &config.gateway));
    let app = build_router(state);

    info!(
        addr = %addr,
        mode = %config.gateway.chat_mode,
        model = %config.provider.model,
        memory = %config.memory.backend,
        "Maitred gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn home_handler() -> &'static str {
    "Restaurant AI backend is running."
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    mode: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.assistant.mode().to_string(),
    })
}
