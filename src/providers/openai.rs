//! OpenAI chat-completions provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_provider_error, CompletionProvider, CompletionRequest, ProviderError, ProviderResult};

/// Default OpenAI REST base.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Chat-completions client authenticated with a bearer API key.
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: &str, api_base: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(OPENAI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            client,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    /// Build the `/chat/completions` body: one system turn, one user turn.
    pub fn build_request_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.instruction }
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature
        })
    }

    /// Extract `choices[0].message.content`.
    pub fn extract_text(response: &Value) -> Option<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        debug!(provider = "openai", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
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
            .ok_or_else(|| ProviderError::Protocol("completion contained no text".into()))
    }

    fn default_model(&self) -> &str {
        DEFAULT_OPENAI_MODEL
    }

    fn name(&self) -> &str {
        "openai"
    }
}
