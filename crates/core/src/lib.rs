//! # ScholaRAG Core
//!
//! Domain types, traits, and error definitions for the ScholaRAG chat
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that the provider, retrieval, pipeline, and gateway crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Both external collaborators of the pipeline are traits here:
//! - [`Provider`] — the LLM generation backend (single-shot + streaming)
//! - [`Retriever`] — the reference-material search backend
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted mocks without touching the network.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{ChatError, ProviderError, RetrievalError};
pub use message::{ChatMessage, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use retrieval::{PassageSource, RetrievedPassage, Retriever};
