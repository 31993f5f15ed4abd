//! Context retriever implementations for ScholaRAG.
//!
//! All retrievers implement the `scholarag_core::Retriever` trait.

pub mod http;
pub mod noop;
pub mod static_docs;

pub use http::HttpRetriever;
pub use noop::NoopRetriever;
pub use static_docs::{StaticRetriever, chunk_document};

use scholarag_config::{RetrievalBackend, RetrievalConfig};
use scholarag_core::error::RetrievalError;
use scholarag_core::retrieval::Retriever;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured retriever.
pub fn build_from_config(config: &RetrievalConfig) -> Result<Arc<dyn Retriever>, RetrievalError> {
    let retriever: Arc<dyn Retriever> = match config.backend {
        RetrievalBackend::None => Arc::new(NoopRetriever),
        RetrievalBackend::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                RetrievalError::Unavailable("retrieval.url is required for the http backend".into())
            })?;
            Arc::new(HttpRetriever::new(url, Duration::from_millis(config.timeout_ms)))
        }
        RetrievalBackend::Static => {
            let dir = config.docs_dir.as_deref().ok_or_else(|| {
                RetrievalError::Unavailable("retrieval.docs_dir is required for the static backend".into())
            })?;
            Arc::new(StaticRetriever::load_dir(dir)?)
        }
    };

    tracing::info!(backend = retriever.name(), "Retriever ready");
    Ok(retriever)
}
