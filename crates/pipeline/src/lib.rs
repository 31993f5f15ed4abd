//! The ScholaRAG chat pipeline.
//!
//! A request flows **validate → retrieve → assemble → generate → respond**:
//!
//! 1. **Validate** the conversation and the backend credential
//! 2. **Retrieve** reference passages for the latest user question
//! 3. **Assemble** system instructions, context, and history into a prompt
//! 4. **Generate** the answer, in one piece or as a stream of fragments
//! 5. **Respond** with the answer and a timestamp, or stream events
//!
//! Retrieval never fails a request; every other failure maps to a
//! [`scholarag_core::ChatError`].

pub mod assembler;
pub mod invoker;
pub mod pipeline;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use assembler::{AssembledPrompt, AssemblyError, SYSTEM_PROMPT, assemble, render_context_block};
pub use invoker::{FragmentStream, GenerationInvoker, GenerationSettings, StreamFailure};
pub use pipeline::{ChatPipeline, ChatReply, RequestPhase, timestamp_now, validate};
pub use stream_event::ChatStreamEvent;
