//! Streaming events for `/api/chat/stream`.
//!
//! `ChatStreamEvent` wraps provider-level fragments into the events the
//! gateway forwards to clients over SSE:
//! - `chunk` — a text fragment, in backend emission order
//! - `done`  — the answer is complete
//! - `error` — generation aborted; earlier chunks are not retracted

use crate::invoker::StreamFailure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Partial text from the backend.
    Chunk { content: String },

    /// Stream finished successfully.
    Done { timestamp: String },

    /// Stream aborted.
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        /// Whether any chunk was delivered before the failure
        partial: bool,
    },
}

impl ChatStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

impl From<&StreamFailure> for ChatStreamEvent {
    fn from(failure: &StreamFailure) -> Self {
        Self::Error {
            error: failure.error.public_message().to_string(),
            details: failure.error.details(),
            partial: failure.is_partial(),
        }
    }
}
