//! Generation backends for ScholaRAG.
//!
//! All providers implement the `scholarag_core::Provider` trait. The
//! provider is built once at startup and shared by every request.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use scholarag_config::AppConfig;
use scholarag_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured generation provider.
///
/// A missing API key does not fail here; the pipeline reports it per
/// request as a configuration error so the server can still start.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    if !config.has_api_key() {
        tracing::warn!("No API key configured; chat requests will fail until one is set");
    }

    let provider = AnthropicProvider::new(config.api_key.clone())
        .with_base_url(&config.provider.base_url)
        .with_timeout(Duration::from_secs(config.request_timeout_secs));

    Arc::new(provider)
}
