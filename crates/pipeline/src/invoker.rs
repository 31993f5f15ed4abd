//! Generation invoker — turns an assembled prompt into an answer.
//!
//! Wraps the injected [`Provider`] with the request settings (model, token
//! limit, temperature) and normalizes every backend failure into a
//! [`ChatError`]. Built once at startup and shared by reference.

use crate::assembler::AssembledPrompt;
use scholarag_config::AppConfig;
use scholarag_core::error::ChatError;
use scholarag_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

/// Per-request generation parameters.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl GenerationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A streamed generation that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct StreamFailure {
    pub error: ChatError,
    /// Fragments handed to the consumer before the failure
    pub fragments_delivered: usize,
}

impl StreamFailure {
    /// True when the consumer already received part of the answer.
    pub fn is_partial(&self) -> bool {
        self.fragments_delivered > 0
    }
}

/// A lazy, finite sequence of answer fragments.
///
/// Not restartable: once it yields `None` or an error, it stays exhausted.
pub struct FragmentStream {
    rx: ChunkReceiver,
    finished: bool,
    delivered: usize,
}

impl FragmentStream {
    fn new(rx: ChunkReceiver) -> Self {
        Self {
            rx,
            finished: false,
            delivered: 0,
        }
    }

    /// Next fragment in emission order.
    ///
    /// `None` means the backend signalled completion. An error ends the
    /// stream; fragments already yielded stand.
    pub async fn next_fragment(&mut self) -> Option<Result<String, ChatError>> {
        if self.finished {
            return None;
        }

        loop {
            match self.rx.recv().await {
                Some(Ok(chunk)) if chunk.done => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(chunk)) => match chunk.content {
                    Some(text) if !text.is_empty() => {
                        self.delivered += 1;
                        return Some(Ok(text));
                    }
                    // usage-only chunk
                    _ => continue,
                },
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    return Some(Err(ChatError::Upstream(
                        "Stream ended before completion".into(),
                    )));
                }
            }
        }
    }

    pub fn fragments_delivered(&self) -> usize {
        self.delivered
    }
}

/// Single-shot and streaming generation over one provider.
pub struct GenerationInvoker {
    provider: Arc<dyn Provider>,
    settings: GenerationSettings,
}

impl GenerationInvoker {
    pub fn new(provider: Arc<dyn Provider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Fail fast when the backend credential is missing.
    pub fn ensure_configured(&self) -> Result<(), ChatError> {
        if self.provider.has_credentials() {
            Ok(())
        } else {
            Err(ChatError::Configuration(format!(
                "provider '{}' has no API key",
                self.provider.name()
            )))
        }
    }

    fn request(&self, prompt: &AssembledPrompt) -> ProviderRequest {
        ProviderRequest {
            model: self.settings.model.clone(),
            system: Some(prompt.system_instructions.to_string()),
            messages: prompt.messages.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    /// Generate the complete answer.
    pub async fn generate_once(&self, prompt: &AssembledPrompt) -> Result<String, ChatError> {
        self.ensure_configured()?;
        debug!(provider = self.provider.name(), model = %self.settings.model, "Generating answer");

        let response = self.provider.complete(self.request(prompt)).await?;
        if response.content.is_empty() {
            return Err(ChatError::UpstreamEmptyResponse);
        }

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Generation usage"
            );
        }
        Ok(response.content)
    }

    /// Establish a stream and hand back its fragments lazily.
    ///
    /// Errors here happen before any fragment exists.
    pub async fn open_stream(&self, prompt: &AssembledPrompt) -> Result<FragmentStream, ChatError> {
        self.ensure_configured()?;
        debug!(provider = self.provider.name(), model = %self.settings.model, "Opening answer stream");

        let rx = self.provider.stream(self.request(prompt)).await?;
        Ok(FragmentStream::new(rx))
    }

    /// Stream the answer, calling `on_fragment` once per fragment in order.
    ///
    /// Returns after the backend signals completion, or with a
    /// [`StreamFailure`] recording how many fragments were delivered.
    pub async fn generate_stream<F>(
        &self,
        prompt: &AssembledPrompt,
        mut on_fragment: F,
    ) -> Result<(), StreamFailure>
    where
        F: FnMut(&str) + Send,
    {
        let mut stream = self.open_stream(prompt).await.map_err(|error| StreamFailure {
            error,
            fragments_delivered: 0,
        })?;

        while let Some(item) = stream.next_fragment().await {
            match item {
                Ok(fragment) => on_fragment(&fragment),
                Err(error) => {
                    return Err(StreamFailure {
                        error,
                        fragments_delivered: stream.fragments_delivered(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::test_helpers::{Script, ScriptedProvider};
    use scholarag_core::error::ProviderError;
    use scholarag_core::message::ChatMessage;

    fn prompt() -> AssembledPrompt {
        assemble(&[ChatMessage::user("What is PRISMA?")], &[]).unwrap()
    }

    fn invoker(provider: Arc<ScriptedProvider>) -> GenerationInvoker {
        GenerationInvoker::new(provider, GenerationSettings::default())
    }

    #[tokio::test]
    async fn generate_once_returns_text_and_sends_settings() {
        let provider = Arc::new(ScriptedProvider::text("PRISMA is a checklist."));
        let answer = invoker(provider.clone()).generate_once(&prompt()).await.unwrap();
        assert_eq!(answer, "PRISMA is a checklist.");

        let request = provider.last_request().unwrap();
        assert_eq!(request.model, "claude-3-5-sonnet-20241022");
        assert_eq!(request.max_tokens, 2048);
        assert!(request.system.unwrap().contains("ScholaRAG"));
    }

    #[tokio::test]
    async fn generate_once_maps_errors() {
        let cases = [
            (
                ProviderError::AuthenticationFailed("bad key".into()),
                ChatError::UpstreamAuth,
            ),
            (
                ProviderError::RateLimited { retry_after_secs: None },
                ChatError::UpstreamRateLimited,
            ),
            (ProviderError::EmptyResponse, ChatError::UpstreamEmptyResponse),
        ];
        for (provider_error, expected) in cases {
            let provider = Arc::new(ScriptedProvider::failing(provider_error));
            let err = invoker(provider).generate_once(&prompt()).await.unwrap_err();
            assert_eq!(err, expected);
        }
    }

    #[tokio::test]
    async fn empty_text_is_empty_response() {
        let provider = Arc::new(ScriptedProvider::text(""));
        let err = invoker(provider).generate_once(&prompt()).await.unwrap_err();
        assert_eq!(err, ChatError::UpstreamEmptyResponse);
    }

    #[tokio::test]
    async fn missing_credentials_skip_backend() {
        let provider = Arc::new(ScriptedProvider::text("unused").without_credentials());
        let err = invoker(provider.clone()).generate_once(&prompt()).await.unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn stream_preserves_order() {
        let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec![
            "PRISMA ", "is a ", "checklist.",
        ])));
        let mut seen = Vec::new();
        invoker(provider)
            .generate_stream(&prompt(), |f| seen.push(f.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["PRISMA ", "is a ", "checklist."]);
        assert_eq!(seen.concat(), "PRISMA is a checklist.");
    }

    #[tokio::test]
    async fn stream_failure_after_fragments_is_partial() {
        let provider = Arc::new(ScriptedProvider::new(Script::FragmentsThenFail(
            vec!["Half ", "an answer"],
            ProviderError::StreamInterrupted("connection reset".into()),
        )));
        let mut seen = Vec::new();
        let failure = invoker(provider)
            .generate_stream(&prompt(), |f| seen.push(f.to_string()))
            .await
            .unwrap_err();

        assert_eq!(seen.len(), 2);
        assert_eq!(failure.fragments_delivered, 2);
        assert!(failure.is_partial());
        assert!(matches!(failure.error, ChatError::Upstream(_)));
    }

    #[tokio::test]
    async fn stream_establishment_failure_is_not_partial() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::RateLimited {
            retry_after_secs: Some(1),
        }));
        let failure = invoker(provider)
            .generate_stream(&prompt(), |_| panic!("no fragments expected"))
            .await
            .unwrap_err();
        assert!(!failure.is_partial());
        assert_eq!(failure.error, ChatError::UpstreamRateLimited);
    }

    #[tokio::test]
    async fn fragment_stream_stays_exhausted() {
        let provider = Arc::new(ScriptedProvider::text("once"));
        let mut stream = invoker(provider).open_stream(&prompt()).await.unwrap();
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "once");
        assert!(stream.next_fragment().await.is_none());
        assert!(stream.next_fragment().await.is_none());
        assert_eq!(stream.fragments_delivered(), 1);
    }

    #[tokio::test]
    async fn closed_channel_without_end_marker_is_an_error() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(tx);
        let mut stream = FragmentStream::new(rx);
        assert!(matches!(
            stream.next_fragment().await,
            Some(Err(ChatError::Upstream(_)))
        ));
        assert!(stream.next_fragment().await.is_none());
    }
}
