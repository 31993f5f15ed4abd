//! Shared test helpers for pipeline tests.

use async_trait::async_trait;
use scholarag_core::error::{ProviderError, RetrievalError};
use scholarag_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use scholarag_core::retrieval::{RetrievedPassage, Retriever};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// What a [`ScriptedProvider`] does when called.
#[derive(Clone)]
pub enum Script {
    /// Answer with fragments; `complete` returns them joined.
    Fragments(Vec<&'static str>),
    /// Stream the fragments, then abort with the error.
    FragmentsThenFail(Vec<&'static str>, ProviderError),
    /// Fail before anything is produced.
    Fail(ProviderError),
}

/// A mock provider driven by a [`Script`], recording every request.
pub struct ScriptedProvider {
    script: Script,
    credentials: bool,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            credentials: true,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn text(text: &'static str) -> Self {
        Self::new(Script::Fragments(vec![text]))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(Script::Fail(error))
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: ProviderRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.record(request);
        match &self.script {
            Script::Fragments(fragments) => Ok(ProviderResponse {
                content: fragments.concat(),
                usage: None,
                model: "mock-model".into(),
                stop_reason: Some("end_turn".into()),
            }),
            Script::FragmentsThenFail(_, error) | Script::Fail(error) => Err(error.clone()),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.record(request);
        let (fragments, failure) = match &self.script {
            Script::Fragments(fragments) => (fragments.clone(), None),
            Script::FragmentsThenFail(fragments, error) => (fragments.clone(), Some(error.clone())),
            Script::Fail(error) => return Err(error.clone()),
        };

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(StreamChunk::text(fragment))).await.is_err() {
                    return;
                }
            }
            let last = match failure {
                Some(error) => Err(error),
                None => Ok(StreamChunk::done()),
            };
            let _ = tx.send(last).await;
        });
        Ok(rx)
    }
}

/// A mock retriever returning fixed passages (or an error), optionally slow.
pub struct MockRetriever {
    result: Result<Vec<RetrievedPassage>, RetrievalError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl MockRetriever {
    pub fn with_passages(passages: Vec<RetrievedPassage>) -> Self {
        Self {
            result: Ok(passages),
            delay: None,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn empty() -> Self {
        Self::with_passages(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            result: Err(RetrievalError::Unavailable("index offline".into())),
            ..Self::empty()
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        "mock"
    }

    async fn retrieve(
        &self,
        query: &str,
        _top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// Captures formatted log output for the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route `debug` and above into this capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
