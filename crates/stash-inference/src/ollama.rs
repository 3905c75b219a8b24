//! Ollama inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stash_core::{
    defaults, EmbeddingBackend, Error, Result, StructuredInference, StructuredRequest,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Ollama inference backend.
///
/// Uses the `/api/chat` endpoint with `format: "json"` for structured
/// generation and `/api/embed` for embeddings. Every request carries its
/// own timeout so a hung model call cannot stall a worker indefinitely.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    embed_model: String,
    dimension: usize,
    gen_timeout_secs: u64,
    embed_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            defaults::EMBED_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        gen_model: String,
        embed_model: String,
        dimension: usize,
    ) -> Self {
        let gen_timeout_secs = std::env::var("STASH_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        let embed_timeout_secs = std::env::var("STASH_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        info!(
            subsystem = "inference",
            component = "ollama",
            base_url = %base_url,
            gen_model = %gen_model,
            embed_model = %embed_model,
            "Initializing Ollama backend"
        );

        Self {
            client,
            base_url,
            gen_model,
            embed_model,
            dimension,
            gen_timeout_secs,
            embed_timeout_secs,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OLLAMA_BASE` | `http://127.0.0.1:11434` |
    /// | `OLLAMA_GEN_MODEL` | `qwen3:8b` |
    /// | `OLLAMA_EMBED_MODEL` | `nomic-embed-text` |
    /// | `OLLAMA_EMBED_DIM` | `768` |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::EMBED_DIMENSION);

        Self::with_config(base_url, gen_model, embed_model, dimension)
    }

    /// Check if the backend is available and responding.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ollama format enforcement; `"json"` guarantees valid JSON output.
    format: &'static str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Strip Markdown code fences some models wrap JSON answers in.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[async_trait]
impl StructuredInference for OllamaBackend {
    async fn generate_structured(&self, req: StructuredRequest) -> Result<serde_json::Value> {
        let start = Instant::now();
        let prompt_len = req.prompt.len();

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: req.system,
                },
                ChatMessage {
                    role: "user",
                    content: req.prompt,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: req.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {e}")))?;

        let content = strip_code_fences(&chat.message.content);
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            warn!(
                subsystem = "inference",
                component = "ollama",
                model = %self.gen_model,
                error = %e,
                "Model returned malformed JSON"
            );
            Error::Inference(format!("Malformed JSON from model: {e}"))
        })?;

        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "generate_structured",
            model = %self.gen_model,
            prompt_len,
            duration_ms = start.elapsed().as_millis() as u64,
            "Structured generation complete"
        );

        Ok(value)
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

/// Request payload for the Ollama `/api/embed` endpoint.
#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

/// Response from the Ollama `/api/embed` endpoint.
#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let embed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {e}")))?;

        if embed.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embed.embeddings.len()
            )));
        }

        Ok(embed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}
