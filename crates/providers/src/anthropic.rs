//! Anthropic Messages API provider.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Streaming via SSE with `content_block_delta` events
//!
//! A stream is only reported complete once `message_stop` arrives. An SSE
//! `error` event, a transport failure, or a body that ends early aborts the
//! stream with an `Err` item.

use async_trait::async_trait;
use futures::StreamExt;
use scholarag_core::error::ProviderError;
use scholarag_core::message::ChatMessage;
use scholarag_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const STREAM_BUFFER: usize = 8;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// A missing key is allowed here; calls then fail with
    /// [`ProviderError::NotConfigured`] before anything goes on the wire.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every backend call, including the full streamed body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("ANTHROPIC_API_KEY not set".into()))
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<AnthropicMessage> = request.messages.iter().map(Into::into).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });

        if let Some(ref system) = request.system {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key()?;

        let mut builder = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Anthropic API error");

        Err(error_for_status(status, &error_body, retry_after_secs))
    }

    /// Convert an Anthropic API response to our ProviderResponse.
    ///
    /// The answer is the first text block; a response without one, or whose
    /// text is empty, is an [`ProviderError::EmptyResponse`].
    fn response_to_provider_response(
        resp: AnthropicResponse,
    ) -> Result<ProviderResponse, ProviderError> {
        let text = resp
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        let usage = resp.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(ProviderResponse {
            content: text,
            usage,
            model: resp.model,
            stop_reason: resp.stop_reason,
        })
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a non-success HTTP status to a provider error.
fn error_for_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(error_message(body, status)),
        429 => ProviderError::RateLimited { retry_after_secs },
        _ => ProviderError::ApiError {
            status_code: status,
            message: error_message(body, status),
        },
    }
}

/// Pull `error.message` out of an Anthropic error body, falling back to the
/// raw text.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<AnthropicErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Map an in-stream `error` event to a provider error.
fn error_for_event(error_type: &str, message: String) -> ProviderError {
    match error_type {
        "authentication_error" | "permission_error" => ProviderError::AuthenticationFailed(message),
        "rate_limit_error" => ProviderError::RateLimited {
            retry_after_secs: None,
        },
        "overloaded_error" => ProviderError::ApiError {
            status_code: 529,
            message,
        },
        _ => ProviderError::StreamInterrupted(message),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Self::response_to_provider_response(api_resp)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);

        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self.send(&body, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for item in decoder.feed(&bytes) {
                    let finished = matches!(item, Ok(StreamChunk { done: true, .. }) | Err(_));
                    // A failed send means the consumer went away; dropping the
                    // response closes the backend connection.
                    if tx.send(item).await.is_err() || finished {
                        return;
                    }
                }
            }

            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(
                    "stream ended before message_stop".into(),
                )))
                .await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let body = serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1,
        });

        match self.send(&body, false).await {
            Ok(_) => Ok(true),
            // Reachable and authenticated, just unhappy with the probe
            Err(ProviderError::ApiError { .. }) | Err(ProviderError::RateLimited { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

// --- SSE decoding ---

/// Incremental decoder for the Messages API event stream.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network reads decode correctly.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    input_tokens: u32,
}

impl SseDecoder {
    /// Feed raw bytes and return the stream items they complete.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk, ProviderError>> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            // `event:` lines are redundant with the `type` field of the data
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }

            let event: serde_json::Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                    continue;
                }
            };

            if let Some(item) = self.interpret(&event) {
                items.push(item);
            }
        }

        items
    }

    fn interpret(&mut self, event: &serde_json::Value) -> Option<Result<StreamChunk, ProviderError>> {
        match event["type"].as_str().unwrap_or("") {
            "message_start" => {
                if let Some(input) = event["message"]["usage"]["input_tokens"].as_u64() {
                    self.input_tokens = input as u32;
                }
                None
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                if delta["type"].as_str() != Some("text_delta") {
                    return None;
                }
                delta["text"]
                    .as_str()
                    .filter(|text| !text.is_empty())
                    .map(|text| Ok(StreamChunk::text(text)))
            }
            "message_delta" => {
                let output = event["usage"]["output_tokens"].as_u64()? as u32;
                Some(Ok(StreamChunk {
                    content: None,
                    done: false,
                    usage: Some(Usage {
                        prompt_tokens: self.input_tokens,
                        completion_tokens: output,
                        total_tokens: self.input_tokens + output,
                    }),
                }))
            }
            "message_stop" => Some(Ok(StreamChunk::done())),
            "error" => {
                let error = &event["error"];
                let message = error["message"].as_str().unwrap_or("stream error").to_string();
                Some(Err(error_for_event(
                    error["type"].as_str().unwrap_or(""),
                    message,
                )))
            }
            _ => None,
        }
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for AnthropicMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
