//! Retriever trait — the contract for reference-material search.
//!
//! Given a query and a result count, a retriever returns ranked passages
//! with provenance. An empty result is a legitimate answer (no match, or
//! retrieval unavailable), never an error the end user sees.

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageSource {
    /// Path relative to the documentation root
    #[serde(default)]
    pub path: String,

    /// File name shown in citations
    pub filename: String,

    /// Position of this fragment within its document
    #[serde(default, alias = "chunk_index")]
    pub fragment_index: usize,
}

/// A unit of retrieved reference text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The passage text
    pub content: String,

    /// Provenance
    #[serde(alias = "metadata")]
    pub source: PassageSource,

    /// Similarity to the query; higher is more relevant
    #[serde(default)]
    pub similarity: f32,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, filename: impl Into<String>, similarity: f32) -> Self {
        let filename = filename.into();
        Self {
            content: content.into(),
            source: PassageSource {
                path: filename.clone(),
                filename,
                fragment_index: 0,
            },
            similarity,
        }
    }
}

/// Sort passages by descending similarity and keep at most `top_k`.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank_passages(mut passages: Vec<RetrievedPassage>, top_k: usize) -> Vec<RetrievedPassage> {
    passages.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    passages.truncate(top_k);
    passages
}

/// The retrieval collaborator of the chat pipeline.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend name for logs (e.g., "none", "http").
    fn name(&self) -> &str;

    /// Return up to `top_k` passages ordered by descending similarity.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError>;
}
