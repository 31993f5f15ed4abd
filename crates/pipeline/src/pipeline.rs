//! The request-to-response chat pipeline.
//!
//! # Flow
//!
//! 1. **Received** — raw messages from the transport
//! 2. **Validated** — non-empty conversation, credential present
//! 3. **ContextResolved** — at most one retrieval, keyed on the latest user
//!    message; failures and timeouts degrade to no context
//! 4. **Generated** — prompt assembled and sent in the requested mode
//! 5. **Responded** — full answer, or fragments then a completion signal
//!
//! Any step may end in **Failed(kind)**. Each request runs in a `chat` span
//! carrying a fresh request id.

use crate::assembler::{AssembledPrompt, AssemblyError, assemble};
use crate::invoker::{FragmentStream, GenerationInvoker, GenerationSettings, StreamFailure};
use crate::stream_event::ChatStreamEvent;
use chrono::{SecondsFormat, Utc};
use scholarag_config::AppConfig;
use scholarag_core::error::ChatError;
use scholarag_core::message::{ChatMessage, last_user_message};
use scholarag_core::provider::Provider;
use scholarag_core::retrieval::{RetrievedPassage, Retriever};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(3);
const EVENT_BUFFER: usize = 16;

/// Where a request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Validated,
    ContextResolved,
    Generated,
    Responded,
    Failed(&'static str),
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Validated => f.write_str("validated"),
            Self::ContextResolved => f.write_str("context_resolved"),
            Self::Generated => f.write_str("generated"),
            Self::Responded => f.write_str("responded"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// A complete single-shot answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub timestamp: String,
}

/// Current time as ISO-8601 UTC with millisecond precision and a `Z` suffix.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reject absent or empty conversations.
pub fn validate(messages: Option<Vec<ChatMessage>>) -> Result<Vec<ChatMessage>, ChatError> {
    match messages {
        Some(messages) if !messages.is_empty() => Ok(messages),
        _ => Err(ChatError::InvalidInput),
    }
}

fn phase(phase: RequestPhase) {
    debug!(phase = %phase, "Request phase");
}

fn fail(error: ChatError) -> ChatError {
    phase(RequestPhase::Failed(error.kind()));
    match &error {
        ChatError::Configuration(detail) => tracing::error!(detail = %detail, "Server misconfigured"),
        other => warn!(kind = other.kind(), error = %other, "Chat request failed"),
    }
    error
}

/// Validation, retrieval, assembly, and generation for one chat request.
pub struct ChatPipeline {
    invoker: GenerationInvoker,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    retrieval_timeout: Duration,
    use_rag: bool,
}

impl ChatPipeline {
    pub fn new(invoker: GenerationInvoker, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            invoker,
            retriever,
            top_k: DEFAULT_TOP_K,
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
            use_rag: true,
        }
    }

    /// Wire a pipeline from configuration and pre-built collaborators.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        let invoker = GenerationInvoker::new(provider, GenerationSettings::from_config(config));
        Self::new(invoker, retriever)
            .with_top_k(config.retrieval.top_k)
            .with_retrieval_timeout(Duration::from_millis(config.retrieval.timeout_ms))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    /// Enable or disable retrieval for every request.
    pub fn with_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    pub fn invoker(&self) -> &GenerationInvoker {
        &self.invoker
    }

    pub fn retriever_name(&self) -> &str {
        self.retriever.name()
    }

    /// Retrieve context for the latest user message.
    ///
    /// Never fails: errors and timeouts are logged and yield no passages.
    pub async fn resolve_context(&self, messages: &[ChatMessage]) -> Vec<RetrievedPassage> {
        if !self.use_rag {
            return Vec::new();
        }
        let Some(query) = last_user_message(messages) else {
            debug!("No user message; skipping retrieval");
            return Vec::new();
        };

        let retrieval = self.retriever.retrieve(&query.content, self.top_k);
        match tokio::time::timeout(self.retrieval_timeout, retrieval).await {
            Ok(Ok(passages)) => {
                debug!(
                    retriever = self.retriever.name(),
                    passages = passages.len(),
                    "Context retrieved"
                );
                passages
            }
            Ok(Err(e)) => {
                warn!(retriever = self.retriever.name(), error = %e, "Retrieval failed; answering without context");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    retriever = self.retriever.name(),
                    timeout_ms = self.retrieval_timeout.as_millis() as u64,
                    "Retrieval timed out; answering without context"
                );
                Vec::new()
            }
        }
    }

    /// Everything up to the generation call.
    async fn prepare(&self, messages: Option<Vec<ChatMessage>>) -> Result<AssembledPrompt, ChatError> {
        phase(RequestPhase::Received);

        let messages = validate(messages).map_err(fail)?;
        self.invoker.ensure_configured().map_err(fail)?;
        phase(RequestPhase::Validated);

        let passages = self.resolve_context(&messages).await;
        phase(RequestPhase::ContextResolved);

        assemble(&messages, &passages).map_err(|e| match e {
            AssemblyError::EmptyConversation => fail(ChatError::InvalidInput),
        })
    }

    /// Answer a conversation in one piece.
    pub async fn respond(&self, messages: Option<Vec<ChatMessage>>) -> Result<ChatReply, ChatError> {
        let span = info_span!("chat", request_id = %Uuid::new_v4(), mode = "single");
        self.respond_once(messages).instrument(span).await
    }

    async fn respond_once(&self, messages: Option<Vec<ChatMessage>>) -> Result<ChatReply, ChatError> {
        let prompt = self.prepare(messages).await?;

        let message = self.invoker.generate_once(&prompt).await.map_err(fail)?;
        phase(RequestPhase::Generated);

        let reply = ChatReply {
            message,
            timestamp: timestamp_now(),
        };
        phase(RequestPhase::Responded);
        info!(chars = reply.message.len(), "Chat answered");
        Ok(reply)
    }

    async fn open(&self, messages: Option<Vec<ChatMessage>>) -> Result<FragmentStream, ChatError> {
        let prompt = self.prepare(messages).await?;
        self.invoker.open_stream(&prompt).await.map_err(fail)
    }

    /// Answer a conversation as a stream of events.
    ///
    /// Returns once the backend stream is established, so failures up to
    /// that point come back as `Err`. Afterwards the receiver yields `chunk`
    /// events followed by exactly one `done` or `error`. Dropping the
    /// receiver stops generation.
    pub async fn respond_stream(
        &self,
        messages: Option<Vec<ChatMessage>>,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>, ChatError> {
        let span = info_span!("chat", request_id = %Uuid::new_v4(), mode = "stream");

        let mut stream = self.open(messages).instrument(span.clone()).await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(
            async move {
                loop {
                    match stream.next_fragment().await {
                        Some(Ok(content)) => {
                            if tx.send(ChatStreamEvent::Chunk { content }).await.is_err() {
                                debug!("Client disconnected; stopping stream");
                                return;
                            }
                        }
                        Some(Err(error)) => {
                            let failure = StreamFailure {
                                error: fail(error),
                                fragments_delivered: stream.fragments_delivered(),
                            };
                            let _ = tx.send(ChatStreamEvent::from(&failure)).await;
                            return;
                        }
                        None => {
                            phase(RequestPhase::Generated);
                            let _ = tx
                                .send(ChatStreamEvent::Done {
                                    timestamp: timestamp_now(),
                                })
                                .await;
                            phase(RequestPhase::Responded);
                            info!(fragments = stream.fragments_delivered(), "Chat streamed");
                            return;
                        }
                    }
                }
            }
            .instrument(span),
        );

        Ok(rx)
    }

    /// Stream the answer straight into a callback.
    pub async fn stream_reply<F>(
        &self,
        messages: Option<Vec<ChatMessage>>,
        on_fragment: F,
    ) -> Result<(), StreamFailure>
    where
        F: FnMut(&str) + Send,
    {
        let span = info_span!("chat", request_id = %Uuid::new_v4(), mode = "callback");
        self.stream_into(messages, on_fragment).instrument(span).await
    }

    async fn stream_into<F>(
        &self,
        messages: Option<Vec<ChatMessage>>,
        on_fragment: F,
    ) -> Result<(), StreamFailure>
    where
        F: FnMut(&str) + Send,
    {
        let prompt = self.prepare(messages).await.map_err(|error| StreamFailure {
            error,
            fragments_delivered: 0,
        })?;
        self.invoker
            .generate_stream(&prompt, on_fragment)
            .await
            .map_err(|failure| StreamFailure {
                error: fail(failure.error),
                ..failure
            })?;
        phase(RequestPhase::Generated);
        phase(RequestPhase::Responded);
        Ok(())
    }
}
