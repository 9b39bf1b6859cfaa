//! Text-completion collaborators.
//!
//! The story service only needs "system instruction + prompt in, text out".
//! [`CompletionProvider`] is that seam; [`openai`] and [`gemini`] implement it
//! over HTTP.

pub mod gemini;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Result, StoryError};

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Failure talking to an upstream API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, timeout, rate limit, or server-side error.
    #[error("temporary failure: {0}")]
    Transient(String),

    /// Credentials were missing, invalid, or lacked permission.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The API rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API answered but the body was not what we expected.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Result alias for collaborator calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Classify a non-success HTTP response.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    let message = error_message(body);
    match status {
        401 | 403 => ProviderError::Auth(message),
        408 | 429 | 500..=599 => ProviderError::Transient(format!("HTTP {status}: {message}")),
        _ => ProviderError::Api { status, message },
    }
}

/// Pull `error.message` out of an OpenAI/Gemini style error body, falling
/// back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// One completion call. Its serialized form is also the cache payload, so
/// every field that changes the answer belongs here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub instruction: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion and return the model's text.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;

    /// Model used when the configuration does not name one.
    fn default_model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Build the configured completion provider.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn CompletionProvider>> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            StoryError::Config(format!(
                "No API key configured for provider '{}'. \
                 Set STORYLOOM_PROVIDER_API_KEY or add it to the config file.",
                config.kind.as_str()
            ))
        })?;

    let client = http_client(config.timeout_secs)?;
    let provider: Box<dyn CompletionProvider> = match config.kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            client,
            api_key,
            config.api_base.as_deref(),
        )),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(
            client,
            api_key,
            config.api_base.as_deref(),
        )),
    };
    Ok(provider)
}

/// Shared HTTP client with a request timeout.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StoryError::Config(format!("Failed to build HTTP client: {e}")))
}
