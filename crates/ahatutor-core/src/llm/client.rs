//! OpenAI-compatible LLM client
//!
//! Async HTTP client for the chat completions endpoint with:
//! - Model fallback with automatic retry
//! - Rate limit handling with exponential backoff
//! - JSON-only structured replies for the pipeline stages

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::structured::{StructuredChat, json_instruction, parse_json_reply};
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message};

/// OpenRouter API base URL
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Chat completions client
///
/// Cheap to clone; share one instance across every stage of a pipeline.
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.config.default_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the configured one, then OpenRouter)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .ok_or_else(|| Error::LLMError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string());

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url,
        })
    }
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .build()
    }

    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn fallback_models(&self) -> &[String] {
        &self.config.fallback_models
    }

    /// Default model first, then the configured fallbacks
    fn candidate_models(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.config.default_model.as_str())
            .chain(self.config.fallback_models.iter().map(String::as_str))
    }

    /// One chat completion against `model` (the default model when `None`)
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let request = ChatRequest::new(model.unwrap_or(&self.config.default_model), messages)
            .with_temperature(temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(self.config.max_tokens);

        let mut attempt = 1;
        loop {
            match self.send(&request).await {
                Err(Error::RateLimited(wait_secs)) if attempt < MAX_RETRY_ATTEMPTS => {
                    let delay = backoff_delay(attempt, wait_secs);
                    warn!(
                        model = %request.model,
                        attempt,
                        wait_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Chat completion that moves on to the next model when one is rate
    /// limited or unavailable
    pub async fn complete_with_fallback(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut last_error = None;

        for model in self.candidate_models() {
            debug!(model, "Attempting chat completion");
            match self.complete(messages.clone(), Some(model), temperature).await {
                Ok(response) => {
                    info!(model, tokens = response.tokens_used, "Chat completion successful");
                    return Ok(response);
                }
                Err(e) if should_try_next_model(&e) => {
                    warn!(model, error = %e, "Model failed, trying next model");
                    last_error = Some(e);
                }
                Err(e) => {
                    error!(model, error = %e, "Chat completion failed");
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::NoSuitableModel("no model configured".to_string())))
    }

    async fn send(&self, request: &ChatRequest) -> Result<LlmResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "AhaTutor")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let header_wait = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body, header_wait));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }
}

#[async_trait]
impl StructuredChat for LlmClient {
    async fn chat_json(
        &self,
        messages: Vec<Message>,
        schema: &Value,
        temperature: Option<f32>,
    ) -> Result<Value> {
        let request_messages: Vec<Message> = std::iter::once(json_instruction(schema))
            .chain(messages)
            .collect();

        let response = self
            .complete_with_fallback(request_messages, temperature)
            .await?;
        parse_json_reply(&response.content)
    }
}

/// Map a non-success HTTP status to an error
///
/// The wait for 429 comes from the `Retry-After` header, then a
/// `retry_after` field in the body, then 60 seconds.
fn status_error(status: u16, body: &str, header_wait: Option<u64>) -> Error {
    match status {
        401 => Error::LLMError(
            "Unauthorized: invalid API key. Set AHATUTOR_API_KEY or OPENROUTER_API_KEY.".to_string(),
        ),
        402 => Error::LLMError("Payment required: insufficient provider credits".to_string()),
        429 => Error::RateLimited(header_wait.or_else(|| retry_after(body)).unwrap_or(60)),
        404 => Error::LLMError(format!("Model not found or endpoint unavailable: {}", body)),
        400 | 403 => Error::LLMError(format!("Request rejected ({}): {}", status, body)),
        500..=599 => Error::LLMError(format!("Server error ({}), provider unavailable: {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Rate limits and model outages move on to the next model; anything else
/// (bad key, bad request, network) would fail the same way again
fn should_try_next_model(error: &Error) -> bool {
    const MODEL_FAILURES: [&str; 6] = [
        "model not found",
        "unavailable",
        "not available",
        "no available provider",
        "overloaded",
        "capacity",
    ];

    match error {
        Error::RateLimited(_) => true,
        Error::LLMError(msg) => {
            let msg = msg.to_lowercase();
            MODEL_FAILURES.iter().any(|pattern| msg.contains(pattern))
        }
        _ => false,
    }
}

/// Exponential backoff, at least the provider's suggested wait, plus up to 10% jitter
fn backoff_delay(attempt: u32, suggested_secs: u64) -> Duration {
    let exponential = BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    let base = exponential.max(suggested_secs.saturating_mul(1000));
    let jitter = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0)
        % (base / 10).max(1);
    Duration::from_millis(base + jitter)
}

fn retry_after(body: &str) -> Option<u64> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(Value::as_u64)
}
