//! # stash-inference
//!
//! Inference backend abstraction for the stash engine.
//!
//! The pipeline treats the inference service as an opaque capability: ask a
//! model for a structured (JSON) answer to a prompt, or embed texts. This
//! crate provides the Ollama-backed implementation of those capabilities,
//! the process-wide request rate limiter, and a deterministic mock backend
//! for tests (feature `mock`).

pub mod limiter;
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use limiter::InferenceLimiter;
pub use ollama::OllamaBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockEmbeddingBackend, MockInferenceBackend, RecordedCall};

// Re-export the backend traits implementers and callers both need
pub use stash_core::{EmbeddingBackend, StructuredInference, StructuredRequest};
