//! Story illustrations via the OpenAI images endpoint.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::providers::openai::OPENAI_API_BASE;
use crate::providers::{parse_provider_error, ProviderError, ProviderResult};

/// A generated image, either hosted by the provider or returned inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Url(String),
    Bytes(Vec<u8>),
}

/// Turns a prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// `size` is a `WIDTHxHEIGHT` string such as `1024x1024`.
    async fn generate(&self, prompt: &str, size: &str) -> ProviderResult<GeneratedImage>;
}

/// `POST /images/generations` client.
pub struct OpenAiImages {
    api_key: String,
    api_base: String,
    model: String,
    quality: String,
    client: Client,
}

impl OpenAiImages {
    pub fn new(client: Client, api_key: &str, model: &str, quality: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: OPENAI_API_BASE.to_string(),
            model: model.to_string(),
            quality: quality.to_string(),
            client,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn build_request_body(&self, prompt: &str, size: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "size": size,
            "quality": self.quality,
            "n": 1
        })
    }

    /// Read `data[0].url`, or decode `data[0].b64_json`.
    pub fn extract_image(response: &Value) -> ProviderResult<GeneratedImage> {
        let first = &response["data"][0];
        if let Some(url) = first["url"].as_str().filter(|u| !u.is_empty()) {
            return Ok(GeneratedImage::Url(url.to_string()));
        }
        if let Some(b64) = first["b64_json"].as_str() {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| ProviderError::Protocol(format!("invalid b64_json image: {e}")))?;
            return Ok(GeneratedImage::Bytes(bytes));
        }
        Err(ProviderError::Protocol(
            "image response had neither url nor b64_json".into(),
        ))
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate(&self, prompt: &str, size: &str) -> ProviderResult<GeneratedImage> {
        debug!(model = %self.model, size, "Requesting illustration");

        let resp = self
            .client
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(prompt, size))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(parse_provider_error(status, &body));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("invalid JSON body: {e}")))?;
        Self::extract_image(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_image_url() {
        let response = json!({ "data": [{ "url": "https://img.example/1.png" }] });
        assert_eq!(
            OpenAiImages::extract_image(&response).unwrap(),
            GeneratedImage::Url("https://img.example/1.png".into())
        );
    }

    #[test]
    fn test_extract_image_b64() {
        let response = json!({ "data": [{ "b64_json": "aGVsbG8=" }] });
        assert_eq!(
            OpenAiImages::extract_image(&response).unwrap(),
            GeneratedImage::Bytes(b"hello".to_vec())
        );
    }

    #[test]
    fn test_extract_image_missing_data() {
        let err = OpenAiImages::extract_image(&json!({ "data": [] })).unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }

    #[test]
    fn test_build_request_body() {
        let images = OpenAiImages::new(Client::new(), "key", "dall-e-3", "standard");
        let body = images.build_request_body("Travel, as a story illustration", "1024x1024");
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["quality"], "standard");
        assert_eq!(body["n"], 1);
    }
}
