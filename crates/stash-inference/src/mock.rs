//! Mock inference backends for deterministic testing.
//!
//! Provides structured-inference and embedding implementations that return
//! configured responses, inject failures, and log every call for assertion.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use stash_core::{
    EmbeddingBackend, Error, Result, StructuredInference, StructuredRequest,
};

/// A recorded inference call, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

struct MockState {
    default_response: JsonValue,
    /// (prompt substring, response) pairs checked in order.
    mappings: Vec<(String, JsonValue)>,
    /// Fail every call when set.
    fail_all: bool,
    /// Fail the next N calls, then recover.
    fail_next: u32,
    /// Probability [0,1] of a random simulated failure.
    failure_rate: f64,
    calls: Vec<RecordedCall>,
}

/// Mock structured-inference backend.
#[derive(Clone)]
pub struct MockInferenceBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockInferenceBackend {
    /// Create a mock returning an empty JSON object for every call.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                default_response: serde_json::json!({}),
                mappings: Vec::new(),
                fail_all: false,
                fail_next: 0,
                failure_rate: 0.0,
                calls: Vec::new(),
            })),
        }
    }

    /// Set the response returned when no mapping matches.
    pub fn with_default_response(self, response: JsonValue) -> Self {
        self.state.lock().unwrap().default_response = response;
        self
    }

    /// Return `response` for any prompt containing `substring`.
    /// Mappings are checked in registration order.
    pub fn with_response_for(self, substring: impl Into<String>, response: JsonValue) -> Self {
        self.state
            .lock()
            .unwrap()
            .mappings
            .push((substring.into(), response));
        self
    }

    /// Fail every call with a simulated inference error.
    pub fn failing(self) -> Self {
        self.state.lock().unwrap().fail_all = true;
        self
    }

    /// Fail the next `n` calls, then behave normally.
    pub fn with_failures(self, n: u32) -> Self {
        self.state.lock().unwrap().fail_next = n;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling under load.
    pub fn with_failure_rate(self, rate: f64) -> Self {
        self.state.lock().unwrap().failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredInference for MockInferenceBackend {
    async fn generate_structured(&self, req: StructuredRequest) -> Result<JsonValue> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            system: req.system.clone(),
            prompt: req.prompt.clone(),
            temperature: req.temperature,
        });

        if state.fail_all {
            return Err(Error::Inference("simulated inference failure".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::Inference("simulated transient failure".to_string()));
        }
        if state.failure_rate > 0.0 {
            use rand::Rng;
            if rand::thread_rng().gen::<f64>() < state.failure_rate {
                return Err(Error::Inference("simulated random failure".to_string()));
            }
        }

        for (needle, response) in &state.mappings {
            if req.prompt.contains(needle.as_str()) || req.system.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }

        Ok(state.default_response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Mock embedding backend producing deterministic vectors from text bytes.
///
/// Identical texts embed identically, so cosine-based matching behaves
/// consistently across test runs.
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: bool,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    /// Fail every embed call.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Deterministic embedding derived from the text's bytes.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let bytes = text.as_bytes();
        (0..dimension)
            .map(|i| {
                let mut acc = 0u32;
                for (j, b) in bytes.iter().enumerate() {
                    acc = acc
                        .wrapping_mul(31)
                        .wrapping_add((*b as u32).wrapping_mul((i + j + 1) as u32));
                }
                // Map into [-1, 1]
                ((acc % 2000) as f32 / 1000.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(Error::Embedding("simulated embedding failure".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Self::generate(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}
