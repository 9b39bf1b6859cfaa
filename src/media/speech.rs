//! Narration via the OpenAI text-to-speech endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::providers::openai::OPENAI_API_BASE;
use crate::providers::{parse_provider_error, ProviderError, ProviderResult};

/// Turns text into audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice. Returns encoded audio.
    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>>;

    /// MIME type of the bytes returned by [`synthesize`](Self::synthesize).
    fn mime_type(&self) -> &str {
        "audio/mpeg"
    }
}

/// `POST /audio/speech` client.
pub struct OpenAiSpeech {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAiSpeech {
    pub fn new(client: Client, api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: OPENAI_API_BASE.to_string(),
            model: model.to_string(),
            client,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self) -> String {
        format!("{}/audio/speech", self.api_base)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        debug!(model = %self.model, voice, chars = text.len(), "Requesting narration");

        let resp = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "voice": voice,
                "input": text,
                "response_format": "mp3"
            }))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(parse_provider_error(status, &body));
        }

        let bytes = resp.bytes().await.map_err(ProviderError::from_transport)?;
        if bytes.is_empty() {
            return Err(ProviderError::Protocol("speech response was empty".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_api_url() {
        let speech = OpenAiSpeech::new(Client::new(), "key", "tts-1");
        assert_eq!(speech.api_url(), "https://api.openai.com/v1/audio/speech");

        let speech = speech.with_api_base("http://localhost:9000/v1/");
        assert_eq!(speech.api_url(), "http://localhost:9000/v1/audio/speech");
    }

    #[test]
    fn test_default_mime_type_is_mp3() {
        let speech = OpenAiSpeech::new(Client::new(), "key", "tts-1");
        assert_eq!(speech.mime_type(), "audio/mpeg");
    }
}
