//! HTTP gateway for ScholaRAG.
//!
//! Exposes the chat pipeline over HTTP:
//!
//! - `POST /api/chat`, `POST /api/chat/stream` (+ `OPTIONS` pre-flight)
//! - `GET  /health`
//!
//! Built on Axum. The pipeline, with its provider and retriever, is built
//! once at startup and shared by every request.

pub mod chat;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use scholarag_config::AppConfig;
use scholarag_pipeline::ChatPipeline;

/// Build the router with all gateway routes.
///
/// Layers applied:
/// - CORS for any origin, `POST`/`OPTIONS`, `Content-Type`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(pipeline: Arc<ChatPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", chat::chat_router(pipeline))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the pipeline from configuration.
pub fn build_pipeline(config: &AppConfig) -> Result<ChatPipeline, Box<dyn std::error::Error>> {
    let provider = scholarag_providers::build_from_config(config);
    let retriever = scholarag_retrieval::build_from_config(&config.retrieval)?;
    Ok(ChatPipeline::from_config(config, provider, retriever))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr();

    let pipeline = Arc::new(build_pipeline(&config)?);
    let invoker = pipeline.invoker();
    info!(
        provider = invoker.provider_name(),
        model = %invoker.settings().model,
        max_tokens = invoker.settings().max_tokens,
        retriever = pipeline.retriever_name(),
        "Chat pipeline ready"
    );

    let app = build_router(pipeline);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
