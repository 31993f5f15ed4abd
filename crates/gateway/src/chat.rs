//! Chat endpoints.
//!
//! - `POST /api/chat`        — answer a conversation in one response
//! - `POST /api/chat/stream` — answer as Server-Sent Events
//!
//! CORS pre-flight is answered by the `CorsLayer` in [`crate::build_router`].
//!
//! Both routes take `{ "messages": [{ "role", "content" }, ...] }`. Failures
//! before the first streamed byte are plain JSON error responses:
//! `{ "error": "...", "details"?: "..." }`.

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use scholarag_core::error::ChatError;
use scholarag_core::message::ChatMessage;
use scholarag_pipeline::{ChatPipeline, ChatReply};

pub type SharedPipeline = Arc<ChatPipeline>;

/// Build the `/api` router.
pub fn chat_router(pipeline: SharedPipeline) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .with_state(pipeline)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map a pipeline error to its HTTP response.
pub fn error_response(err: &ChatError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.public_message(),
            details: err.details(),
        }),
    )
}

/// Any body that does not decode to `{ messages: [...] }` is invalid input.
fn decode(payload: Result<Json<ChatRequest>, JsonRejection>) -> Option<Vec<ChatMessage>> {
    match payload {
        Ok(Json(request)) => request.messages,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Rejected chat request body");
            None
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /api/chat`
async fn chat_handler(
    State(pipeline): State<SharedPipeline>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    info!("api/chat request");

    pipeline
        .respond(decode(payload))
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// `POST /api/chat/stream`
///
/// Events: `chunk` per fragment, then `done`, or `error` if the backend
/// fails mid-answer.
async fn chat_stream_handler(
    State(pipeline): State<SharedPipeline>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!("api/chat/stream SSE request");

    let rx = pipeline
        .respond_stream(decode(payload))
        .await
        .map_err(|e| error_response(&e))?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream))
}
