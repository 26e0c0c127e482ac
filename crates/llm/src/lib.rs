//! Single-call completion client for the hosted chat model.
//!
//! The dialogue core prompts the model exactly once per turn and expects one
//! text reply; no streaming or tool calling is exposed. Decoding parameters
//! are fixed at construction so every call is deterministic-ish.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// The closed set of completion failures. Every variant is recoverable: the
/// response shaper converts any of them into a catalog-only fallback reply.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("llm call exceeded its deadline")]
    Timeout,
    #[error("llm returned an empty reply")]
    Empty,
}

/// Seam between the dialogue core and the hosted model, so tests can swap in
/// a scripted backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Blocking single-shot completion: prompt in, raw model text out.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Decoding parameters applied to every request. Fixed at construction.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:14b".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            timeout: Duration::from_secs(90),
        }
    }
}

/// HTTP client over an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl HttpLlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| LlmError::Unavailable(error.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.settings.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.settings.temperature,
                "num_predict": self.settings.max_tokens,
            },
        });

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Unavailable(error.to_string())
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Unavailable(error.to_string())
            }
        })?;

        if !status.is_success() {
            warn!(%status, "llm endpoint returned an error body");
            return Err(LlmError::Unavailable(format!("status {status}: {body}")));
        }

        let text = body
            .get("response")
            .and_then(|value| value.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        debug!(
            model = %self.settings.model,
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "llm completion finished"
        );

        if text.is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(text)
    }
}

/// Run `backend.complete` under a caller-supplied deadline. A deadline
/// shorter than the client's own transport timeout wins.
pub async fn complete_within(
    backend: &dyn CompletionBackend,
    prompt: &str,
    budget: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(budget, backend.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout),
    }
}
