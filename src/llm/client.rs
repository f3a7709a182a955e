/// Chat-completions HTTP client.
///
/// This module provides `LlmClient` for making synchronous requests to any
/// OpenAI-compatible `/chat/completions` endpoint, along with error types and
/// a builder for configuration.
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Sampling temperature for tag suggestions.
const TEMPERATURE: f64 = 0.2;

/// Errors that can occur when talking to the chat endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("LLM error {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Malformed or unexpected API responses
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl LlmError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }
}

/// Builder for constructing `LlmClient` instances.
///
/// # Examples
///
/// ```
/// use tagmark::llm::LlmClientBuilder;
///
/// let client = LlmClientBuilder::new()
///     .base_url("https://api.openai.com/v1/")
///     .model("gpt-4o-mini")
///     .json_mode(true)
///     .build()
///     .expect("Failed to create client");
///
/// assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
/// ```
#[derive(Debug, Default)]
pub struct LlmClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    json_mode: bool,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL (e.g., "https://api.openai.com/v1").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name sent with each request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the bearer token. Empty keys are ignored.
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Requests `response_format: {"type": "json_object"}`.
    pub fn json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    /// Builds the `LlmClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// Unset values fall back to `TAGMARK_LLM_BASE_URL`, `TAGMARK_LLM_MODEL`
    /// and `TAGMARK_LLM_API_KEY`, then to the defaults in `LlmSettings`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidUrl` for an unparseable base URL, or
    /// `LlmError::Network` if the HTTP client cannot be created.
    pub fn build(self) -> Result<LlmClient, LlmError> {
        let defaults = crate::config::LlmSettings::default();

        let base_url = self
            .base_url
            .or_else(|| std::env::var("TAGMARK_LLM_BASE_URL").ok())
            .unwrap_or(defaults.base_url);
        let model = self
            .model
            .or_else(|| std::env::var("TAGMARK_LLM_MODEL").ok())
            .unwrap_or(defaults.model);
        let api_key = self.api_key.or_else(|| {
            std::env::var("TAGMARK_LLM_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
        });

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Network)?;

        Ok(LlmClient {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
            json_mode: self.json_mode,
        })
    }
}

/// Trait for chat-completion operations.
///
/// This trait enables mocking in unit tests.
pub trait LlmClientTrait: Send + Sync {
    /// Sends a system and a user message; returns the assistant's reply text.
    fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Synchronous client for an OpenAI-compatible chat endpoint.
///
/// It should be constructed using `LlmClientBuilder`.
pub struct LlmClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    json_mode: bool,
}

impl LlmClient {
    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": TEMPERATURE
        });
        if self.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    fn complete_once(&self, body: &serde_json::Value) -> Result<String, LlmError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(LlmError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
            });
        }

        let text = response.text().map_err(LlmError::from_reqwest)?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(LlmError::Serialization)?;
        reply_content(&json)
    }
}

impl LlmClientTrait for LlmClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = self.request_body(system, user);
        debug!(endpoint = %self.endpoint, model = %self.model, "requesting chat completion");
        retry_with_backoff(|| self.complete_once(&body))
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions response.
fn reply_content(json: &serde_json::Value) -> Result<String, LlmError> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Api {
            message: "Missing 'choices[0].message.content' in API response".to_string(),
        })
}

/// Retries an operation with exponential backoff.
///
/// After the first attempt, retries up to 3 times with delays of 1s, 2s and
/// 4s. Only transient errors (network, timeout, HTTP 5xx) are retried.
pub fn retry_with_backoff<F, T>(f: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    retry_with_delays(f, &[1, 2, 4].map(Duration::from_secs))
}

fn retry_with_delays<F, T>(mut f: F, delays: &[Duration]) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for delay in delays {
        warn!(error = %last_error, ?delay, "retrying LLM request");
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for transient errors (HTTP 5xx, network errors, timeouts).
fn should_retry(error: &LlmError) -> bool {
    match error {
        LlmError::Network(_) | LlmError::Timeout(_) => true,
        LlmError::Http { status } => (500..600).contains(status),
        LlmError::Serialization(_) | LlmError::Api { .. } | LlmError::InvalidUrl(_) => false,
    }
}
