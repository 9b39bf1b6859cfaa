//! Cache-aware story generation.
//!
//! Flow per user action: build the completion request, hash it into a key,
//! serve from the cache on a hit, otherwise call the provider, validate the
//! answer, and write it through to the cache.

use tracing::{debug, info, warn};

use super::parse::{parse_story_response, split_sections, validate_story_value, StoryResponse, StorySections};
use super::request::StoryRequest;
use crate::cache::{cache_key, CacheKey, ResponseCache};
use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::error::{Result, StoryError};
use crate::media::{GeneratedImage, ImageGenerator, OpenAiImages, OpenAiSpeech, SpeechSynthesizer};
use crate::providers::{create_provider, http_client, CompletionProvider};

/// Model parameters applied to every story prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// `None` uses the provider's default model.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for GenerationSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Result of one `generate` call.
#[derive(Debug, Clone)]
pub struct StoryOutcome {
    pub response: StoryResponse,
    pub original: StorySections,
    pub translated: StorySections,
    pub key: CacheKey,
    pub cache_hit: bool,
    /// Set when the answer could not be persisted; it is still cached in memory.
    pub cache_warning: Option<String>,
}

impl StoryOutcome {
    fn new(response: StoryResponse, key: CacheKey, cache_hit: bool) -> Self {
        Self {
            original: split_sections(&response.original_story),
            translated: split_sections(&response.translated_story),
            response,
            key,
            cache_hit,
            cache_warning: None,
        }
    }

    /// Text read aloud for narration: the original sections joined by spaces.
    pub fn narration_text(&self) -> String {
        format!(
            "{} {} {}",
            self.original.introduction, self.original.development, self.original.conclusion
        )
    }
}

/// Synthesized narration.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio: Vec<u8>,
    pub mime_type: String,
}

struct Narrator {
    synthesizer: Box<dyn SpeechSynthesizer>,
    voice: String,
}

struct Illustrator {
    generator: Box<dyn ImageGenerator>,
    size: String,
}

/// Generates stories through a completion provider, backed by an optional
/// response cache and optional narration/illustration collaborators.
pub struct StoryService {
    provider: Box<dyn CompletionProvider>,
    settings: GenerationSettings,
    cache: Option<ResponseCache>,
    narrator: Option<Narrator>,
    illustrator: Option<Illustrator>,
}

impl StoryService {
    pub fn new(provider: Box<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            provider,
            settings,
            cache: None,
            narrator: None,
            illustrator: None,
        }
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_speech(mut self, synthesizer: Box<dyn SpeechSynthesizer>, voice: &str) -> Self {
        self.narrator = Some(Narrator {
            synthesizer,
            voice: voice.to_string(),
        });
        self
    }

    pub fn with_images(mut self, generator: Box<dyn ImageGenerator>, size: &str) -> Self {
        self.illustrator = Some(Illustrator {
            generator,
            size: size.to_string(),
        });
        self
    }

    /// Wire up the provider, cache, and media collaborators from `config`.
    ///
    /// `use_cache = false` skips the cache even when the config enables it.
    pub fn from_config(config: &Config, use_cache: bool) -> Result<Self> {
        let provider = create_provider(&config.provider)?;
        let mut service = Self::new(provider, GenerationSettings::from(&config.provider));

        if use_cache && config.cache.enabled {
            service = service.with_cache(ResponseCache::load(config.cache.resolved_path()));
        }

        let openai_base = match config.provider.kind {
            ProviderKind::OpenAi => config.provider.api_base.as_deref(),
            ProviderKind::Gemini => None,
        };

        if config.speech.enabled {
            let key = config
                .media_api_key(config.speech.api_key.as_deref())
                .ok_or_else(|| StoryError::Config("Speech is enabled but no OpenAI API key is set".into()))?;
            let mut speech = OpenAiSpeech::new(
                http_client(config.provider.timeout_secs)?,
                key,
                &config.speech.model,
            );
            if let Some(base) = openai_base {
                speech = speech.with_api_base(base);
            }
            service = service.with_speech(Box::new(speech), &config.speech.voice);
        }

        if config.image.enabled {
            let key = config
                .media_api_key(config.image.api_key.as_deref())
                .ok_or_else(|| StoryError::Config("Images are enabled but no OpenAI API key is set".into()))?;
            let mut images = OpenAiImages::new(
                http_client(config.provider.timeout_secs)?,
                key,
                &config.image.model,
                &config.image.quality,
            );
            if let Some(base) = openai_base {
                images = images.with_api_base(base);
            }
            service = service.with_images(Box::new(images), &config.image.size);
        }

        Ok(service)
    }

    /// Model that will be sent with the next prompt.
    pub fn model(&self) -> &str {
        self.settings
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Produce a story for `request`, from the cache when possible.
    pub async fn generate(&mut self, request: &StoryRequest) -> Result<StoryOutcome> {
        let completion = request.completion_request(
            self.model(),
            self.settings.max_tokens,
            self.settings.temperature,
        );
        let key = cache_key(&completion)?;

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            match validate_story_value(cached) {
                Ok(response) => {
                    info!(key = %key.short(), "Serving story from cache");
                    return Ok(StoryOutcome::new(response, key, true));
                }
                Err(e) => {
                    warn!(key = %key.short(), error = %e, "Cached entry has an unexpected shape, regenerating");
                }
            }
        }

        debug!(
            key = %key.short(),
            provider = self.provider.name(),
            model = %completion.model,
            "Cache miss, calling provider"
        );
        let raw = self.provider.complete(&completion).await?;
        let response = parse_story_response(&raw)?;

        let mut cache_warning = None;
        if let Some(cache) = self.cache.as_mut() {
            let value = serde_json::to_value(&response)?;
            if let Err(e) = cache.put(key.clone(), value) {
                warn!(error = %e, "Story kept in memory only");
                cache_warning = Some(e.to_string());
            }
        }

        let mut outcome = StoryOutcome::new(response, key, false);
        outcome.cache_warning = cache_warning;
        Ok(outcome)
    }

    /// Read the story aloud.
    pub async fn narrate(&self, outcome: &StoryOutcome) -> Result<Narration> {
        let narrator = self
            .narrator
            .as_ref()
            .ok_or(StoryError::FeatureDisabled("Speech synthesis"))?;
        let audio = narrator
            .synthesizer
            .synthesize(&outcome.narration_text(), &narrator.voice)
            .await?;
        Ok(Narration {
            audio,
            mime_type: narrator.synthesizer.mime_type().to_string(),
        })
    }

    /// Draw an illustration for the request's topic.
    pub async fn illustrate(&self, request: &StoryRequest) -> Result<GeneratedImage> {
        let illustrator = self
            .illustrator
            .as_ref()
            .ok_or(StoryError::FeatureDisabled("Image generation"))?;
        let image = illustrator
            .generator
            .generate(&request.illustration_prompt(), &illustrator.size)
            .await?;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionRequest, ProviderError, ProviderResult};
    use crate::story::catalog::{Language, Level, StoryLength, Topic};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const STORY_JSON: &str = r#"{
        "original_story": "Ana viaja.\n\nConoce a Luis.\n\nVuelven.",
        "translated_story": "Ana seyahat eder.\n\nLuis ile tanışır.\n\nDönerler.",
        "vocabulary": [{"word": "viaje", "translation": "seyahat"}]
    }"#;

    /// Returns a fixed answer and counts calls.
    struct CannedProvider {
        answer: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(&self, _request: &CompletionRequest) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }

        fn default_model(&self) -> &str {
            "canned-model"
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    /// A provider that always fails with a transient error.
    struct DownProvider;

    #[async_trait]
    impl CompletionProvider for DownProvider {
        async fn complete(&self, _request: &CompletionRequest) -> ProviderResult<String> {
            Err(ProviderError::Transient("connection refused".into()))
        }

        fn default_model(&self) -> &str {
            "down"
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    struct RecordingSpeech {
        heard: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSpeech {
        async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
            self.heard
                .lock()
                .unwrap()
                .push((text.to_string(), voice.to_string()));
            Ok(b"ID3fake".to_vec())
        }
    }

    struct FixedImage;

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate(&self, prompt: &str, size: &str) -> ProviderResult<GeneratedImage> {
            Ok(GeneratedImage::Url(format!("https://img.test/{size}?p={prompt}")))
        }
    }

    fn canned(answer: &str) -> (Box<dyn CompletionProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CannedProvider {
            answer: answer.to_string(),
            calls: Arc::clone(&calls),
        };
        (Box::new(provider), calls)
    }

    fn request() -> StoryRequest {
        StoryRequest::new(
            Language::Turkish,
            Language::Spanish,
            Level::B1,
            Topic::Travel,
            StoryLength::Short,
            None,
        )
        .unwrap()
    }

    fn cache_in(tmp: &TempDir) -> ResponseCache {
        ResponseCache::load(tmp.path().join("responses.json"))
    }

    #[tokio::test]
    async fn test_second_identical_request_is_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        let (provider, calls) = canned(STORY_JSON);
        let mut service =
            StoryService::new(provider, GenerationSettings::default()).with_cache(cache_in(&tmp));

        let first = service.generate(&request()).await.unwrap();
        assert!(!first.cache_hit);
        let second = service.generate(&request()).await.unwrap();
        assert!(second.cache_hit);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.response, second.response);
        assert_eq!(first.key, second.key);
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let tmp = TempDir::new().unwrap();
        {
            let (provider, _) = canned(STORY_JSON);
            let mut service = StoryService::new(provider, GenerationSettings::default())
                .with_cache(cache_in(&tmp));
            service.generate(&request()).await.unwrap();
        }

        let (provider, calls) = canned("never used");
        let mut service =
            StoryService::new(provider, GenerationSettings::default()).with_cache(cache_in(&tmp));
        let outcome = service.generate(&request()).await.unwrap();
        assert!(outcome.cache_hit);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_without_cache_every_call_hits_provider() {
        let (provider, calls) = canned(STORY_JSON);
        let mut service = StoryService::new(provider, GenerationSettings::default());
        service.generate(&request()).await.unwrap();
        service.generate(&request()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(service.cache().is_none());
    }

    #[tokio::test]
    async fn test_bad_shape_is_reported_and_not_cached() {
        let tmp = TempDir::new().unwrap();
        let (provider, _) = canned("Once upon a time there was no JSON.");
        let mut service =
            StoryService::new(provider, GenerationSettings::default()).with_cache(cache_in(&tmp));

        let err = service.generate(&request()).await.unwrap_err();
        assert!(matches!(err, StoryError::ResponseShape(_)));
        assert!(service.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported_and_not_cached() {
        let tmp = TempDir::new().unwrap();
        let mut service = StoryService::new(Box::new(DownProvider), GenerationSettings::default())
            .with_cache(cache_in(&tmp));

        let err = service.generate(&request()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(service.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_story() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cache = ResponseCache::load(blocker.join("responses.json"));

        let (provider, calls) = canned(STORY_JSON);
        let mut service =
            StoryService::new(provider, GenerationSettings::default()).with_cache(cache);

        let outcome = service.generate(&request()).await.unwrap();
        assert!(outcome.cache_warning.is_some());

        // Still served from memory for the rest of the run.
        assert!(service.generate(&request()).await.unwrap().cache_hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_regenerated() {
        let tmp = TempDir::new().unwrap();
        let settings = GenerationSettings::default();
        let (provider, calls) = canned(STORY_JSON);

        let mut cache = cache_in(&tmp);
        let completion = request().completion_request(
            provider.default_model(),
            settings.max_tokens,
            settings.temperature,
        );
        cache
            .put(cache_key(&completion).unwrap(), json!("raw text from an old build"))
            .unwrap();

        let mut service = StoryService::new(provider, settings).with_cache(cache);
        let outcome = service.generate(&request()).await.unwrap();
        assert!(!outcome.cache_hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(service.generate(&request()).await.unwrap().cache_hit);
    }

    #[tokio::test]
    async fn test_model_override_changes_key() {
        let (provider, _) = canned(STORY_JSON);
        let mut default_model = StoryService::new(provider, GenerationSettings::default());
        let (provider, _) = canned(STORY_JSON);
        let mut other_model = StoryService::new(
            provider,
            GenerationSettings {
                model: Some("other".into()),
                ..GenerationSettings::default()
            },
        );
        assert_eq!(default_model.model(), "canned-model");
        assert_eq!(other_model.model(), "other");

        let a = default_model.generate(&request()).await.unwrap();
        let b = other_model.generate(&request()).await.unwrap();
        assert_ne!(a.key, b.key);
    }

    #[tokio::test]
    async fn test_outcome_sections() {
        let (provider, _) = canned(STORY_JSON);
        let mut service = StoryService::new(provider, GenerationSettings::default());
        let outcome = service.generate(&request()).await.unwrap();
        assert_eq!(outcome.original.introduction, "Ana viaja.");
        assert_eq!(outcome.translated.conclusion, "Dönerler.");
        assert_eq!(outcome.narration_text(), "Ana viaja. Conoce a Luis. Vuelven.");
    }

    #[tokio::test]
    async fn test_narrate_requires_speech() {
        let (provider, _) = canned(STORY_JSON);
        let mut service = StoryService::new(provider, GenerationSettings::default());
        let outcome = service.generate(&request()).await.unwrap();
        let err = service.narrate(&outcome).await.unwrap_err();
        assert!(matches!(err, StoryError::FeatureDisabled(_)));
    }

    #[tokio::test]
    async fn test_narrate_sends_original_text_and_voice() {
        let heard = Arc::new(Mutex::new(Vec::new()));
        let (provider, _) = canned(STORY_JSON);
        let mut service = StoryService::new(provider, GenerationSettings::default()).with_speech(
            Box::new(RecordingSpeech {
                heard: Arc::clone(&heard),
            }),
            "alloy",
        );
        let outcome = service.generate(&request()).await.unwrap();
        let narration = service.narrate(&outcome).await.unwrap();

        assert_eq!(narration.mime_type, "audio/mpeg");
        assert_eq!(narration.audio, b"ID3fake");
        let heard = heard.lock().unwrap();
        assert_eq!(heard[0].0, "Ana viaja. Conoce a Luis. Vuelven.");
        assert_eq!(heard[0].1, "alloy");
    }

    #[tokio::test]
    async fn test_illustrate_uses_topic_prompt_and_size() {
        let (provider, _) = canned(STORY_JSON);
        let service = StoryService::new(provider, GenerationSettings::default())
            .with_images(Box::new(FixedImage), "512x512");
        let image = service.illustrate(&request()).await.unwrap();
        assert_eq!(
            image,
            GeneratedImage::Url("https://img.test/512x512?p=Travel, as a story illustration".into())
        );
    }

    #[tokio::test]
    async fn test_illustrate_requires_images() {
        let (provider, _) = canned(STORY_JSON);
        let service = StoryService::new(provider, GenerationSettings::default());
        assert!(matches!(
            service.illustrate(&request()).await.unwrap_err(),
            StoryError::FeatureDisabled(_)
        ));
    }
}
