//! HTTP retriever — delegates search to a remote vector-store service.
//!
//! Request: `POST {url}` with `{"query": "...", "top_k": N}`.
//! Response: `{"results": [passage, ...]}` or a bare `[passage, ...]`,
//! where a passage is `{"content", "metadata"|"source", "similarity"}`.

use async_trait::async_trait;
use scholarag_core::error::RetrievalError;
use scholarag_core::retrieval::{RetrievedPassage, Retriever, rank_passages};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Retriever backed by a remote search endpoint.
pub struct HttpRetriever {
    url: String,
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<RetrievedPassage> },
    Bare(Vec<RetrievedPassage>),
}

impl SearchResponse {
    fn into_passages(self) -> Vec<RetrievedPassage> {
        match self {
            Self::Wrapped { results } => results,
            Self::Bare(results) => results,
        }
    }
}

/// Decode a search response body.
fn parse_results(body: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
    serde_json::from_str::<SearchResponse>(body)
        .map(SearchResponse::into_passages)
        .map_err(|e| RetrievalError::Malformed(e.to_string()))
}

#[async_trait]
impl Retriever for HttpRetriever {
    fn name(&self) -> &str {
        "http"
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        debug!(url = %self.url, top_k, "Querying retrieval service");

        let response = self
            .client
            .post(&self.url)
            .json(&SearchRequest { query, top_k })
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(RetrievalError::BadStatus {
                status_code: status.as_u16(),
                message: body,
            });
        }

        Ok(rank_passages(parse_results(&body)?, top_k))
    }
}
