//! Gemini `generateContent` completion provider.
//!
//! Reasoning models interleave parts marked `"thought": true`; only the
//! answer parts are returned as the story text.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_provider_error, CompletionProvider, CompletionRequest, ProviderError, ProviderResult};

/// Default REST base (v1beta).
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini `generateContent` client authenticated with an API key.
pub struct GeminiProvider {
    api_key: String,
    api_base: String,
    client: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: &str, api_base: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            client,
        }
    }

    fn api_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    /// Build a `generateContent` body with the system prompt lifted into
    /// `systemInstruction`.
    pub fn build_request_body(request: &CompletionRequest) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.instruction }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens
            }
        })
    }

    /// Text of the first candidate, answer parts only.
    ///
    /// A candidate made solely of thought parts yields those instead.
    pub fn extract_text(response: &Value) -> Option<String> {
        let parts = response
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)?;

        let (thoughts, answer): (Vec<&Value>, Vec<&Value>) = parts
            .iter()
            .partition(|p| p.get("thought").and_then(Value::as_bool) == Some(true));

        let join = |group: &[&Value]| -> String {
            group
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        };

        let text = match join(&answer) {
            t if t.is_empty() => join(&thoughts),
            t => t,
        };
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(self.api_url(&request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_request_body(request))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_provider_error(status, &body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("invalid JSON body: {e}")))?;

        Self::extract_text(&json)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::Protocol("response contained no text parts".into()))
    }

    fn default_model(&self) -> &str {
        DEFAULT_GEMINI_MODEL
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
