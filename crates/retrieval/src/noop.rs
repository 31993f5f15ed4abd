//! No-op retriever — disables grounding entirely.
//!
//! Every query yields no passages, so answers are generated without
//! retrieved context. This is the default backend.

use async_trait::async_trait;
use scholarag_core::error::RetrievalError;
use scholarag_core::retrieval::{RetrievedPassage, Retriever};

/// A retriever that never finds anything.
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    fn name(&self) -> &str { "none" }

    async fn retrieve(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        Ok(Vec::new())
    }
}
