//! Error types for the ScholaRAG domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//!
//! - [`ProviderError`] is what a generation backend reports.
//! - [`RetrievalError`] is what a retriever reports; the pipeline never
//!   surfaces it to callers.
//! - [`ChatError`] is the client-facing taxonomy. Each variant maps 1:1 to
//!   an HTTP status and a fixed `error` string.

use thiserror::Error;

/// Public message for every failure that is not one of the specific kinds.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate response";

/// The client-facing error taxonomy of the chat pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Client-supplied data is malformed. Never retried.
    #[error("Invalid request: messages array required")]
    InvalidInput,

    /// The deployment is missing a required credential.
    ///
    /// The inner detail is for logs only and is never sent to the client.
    #[error("Server configuration error")]
    Configuration(String),

    /// The backend rejected our credentials.
    #[error("Authentication failed - check API key")]
    UpstreamAuth,

    /// The backend throttled us.
    #[error("Rate limit exceeded - please try again later")]
    UpstreamRateLimited,

    /// The backend answered but produced no text.
    #[error("No text content in response")]
    UpstreamEmptyResponse,

    /// Any other backend or internal failure; the detail is forwarded.
    #[error("{0}")]
    Upstream(String),
}

impl ChatError {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::UpstreamAuth => 401,
            Self::UpstreamRateLimited => 429,
            Self::Configuration(_) | Self::UpstreamEmptyResponse | Self::Upstream(_) => 500,
        }
    }

    /// The human-readable `error` field of the response body.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid request: messages array required",
            Self::Configuration(_) => "Server configuration error",
            Self::UpstreamAuth => "Authentication failed - check API key",
            Self::UpstreamRateLimited => "Rate limit exceeded - please try again later",
            Self::UpstreamEmptyResponse | Self::Upstream(_) => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// The optional `details` field. Only generic failures carry one.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::UpstreamEmptyResponse => Some(self.to_string()),
            Self::Upstream(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    /// Short machine-readable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Configuration(_) => "configuration_error",
            Self::UpstreamAuth => "upstream_auth_error",
            Self::UpstreamRateLimited => "upstream_rate_limited",
            Self::UpstreamEmptyResponse => "upstream_empty_response",
            Self::Upstream(_) => "upstream_error",
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AuthenticationFailed(_) => Self::UpstreamAuth,
            ProviderError::RateLimited { .. } => Self::UpstreamRateLimited,
            ProviderError::EmptyResponse => Self::UpstreamEmptyResponse,
            ProviderError::NotConfigured(detail) => Self::Configuration(detail),
            ProviderError::ApiError { message, .. } => Self::Upstream(message),
            other => Self::Upstream(other.to_string()),
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No text content in response")]
    EmptyResponse,

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval request failed with status {status_code}: {message}")]
    BadStatus { status_code: u16, message: String },

    #[error("Malformed retrieval response: {0}")]
    Malformed(String),

    #[error("Failed to load documents from {path}: {reason}")]
    Load { path: String, reason: String },
}
