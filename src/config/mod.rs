//! Configuration loading.
//!
//! Config lives at `~/.storyloom/config.json`. Every section is optional and
//! falls back to defaults. Values from `.env` and the process environment are
//! layered on top:
//!
//! | Variable | Field |
//! |---|---|
//! | `STORYLOOM_PROVIDER_KIND` | `provider.kind` |
//! | `STORYLOOM_PROVIDER_API_KEY` | `provider.api_key` |
//! | `STORYLOOM_PROVIDER_MODEL` | `provider.model` |
//! | `STORYLOOM_PROVIDER_API_BASE` | `provider.api_base` |
//! | `STORYLOOM_CACHE_ENABLED` | `cache.enabled` |
//! | `STORYLOOM_CACHE_PATH` | `cache.path` |
//! | `STORYLOOM_LOG_FORMAT` | `logging.format` |
//!
//! When no provider key is set, `OPENAI_API_KEY` (or `GEMINI_API_KEY` /
//! `GOOGLE_API_KEY` for Gemini) is used.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoryError};

const REDACTED: &str = "[REDACTED]";

/// Which completion backend to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(StoryError::Config(format!(
                "Unknown provider '{other}' (expected 'openai' or 'gemini')"
            ))),
        }
    }
}

/// Completion provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    /// Model override. `None` uses the provider's default model.
    pub model: Option<String>,
    /// Base URL override, e.g. for an OpenAI-compatible gateway.
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key: None,
            model: None,
            api_base: None,
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Store location. `None` means `~/.storyloom/cache/responses.json`.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| Config::dir().join("cache").join("responses.json"))
    }
}

/// Text-to-speech settings (OpenAI audio API).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Falls back to the provider key when the provider is OpenAI.
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

/// Illustration settings (OpenAI images API).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
        }
    }
}

impl fmt::Debug for ImageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("size", &self.size)
            .field("quality", &self.quality)
            .finish()
    }
}

/// Where narration audio and illustration bytes are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// `None` means `~/.storyloom/media`.
    pub dir: Option<PathBuf>,
}

impl MediaConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| Config::dir().join("media"))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "warn".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub speech: SpeechConfig,
    pub image: ImageConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Base directory: `~/.storyloom`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".storyloom")
    }

    /// Default config file: `~/.storyloom/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load `.env`, the config file at `path`, and environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env file");
        }
        let mut config = Self::load_from_path(path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse the config file at `path` without consulting the environment.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) if data.trim().is_empty() => Ok(Self::default()),
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                StoryError::Config(format!("Invalid config file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoryError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Layer environment values over the file values.
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    /// A value that does not parse is a [`StoryError::Config`], never ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(kind) = get("STORYLOOM_PROVIDER_KIND") {
            self.provider.kind = kind
                .parse()
                .map_err(|e| StoryError::Config(format!("STORYLOOM_PROVIDER_KIND: {e}")))?;
        }
        if let Some(key) = get("STORYLOOM_PROVIDER_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = get("STORYLOOM_PROVIDER_MODEL") {
            self.provider.model = Some(model);
        }
        if let Some(base) = get("STORYLOOM_PROVIDER_API_BASE") {
            self.provider.api_base = Some(base);
        }
        if let Some(enabled) = get("STORYLOOM_CACHE_ENABLED") {
            self.cache.enabled = parse_bool(&enabled).ok_or_else(|| {
                StoryError::Config(format!(
                    "STORYLOOM_CACHE_ENABLED: expected true or false, got '{enabled}'"
                ))
            })?;
        }
        if let Some(path) = get("STORYLOOM_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(path));
        }
        if let Some(format) = get("STORYLOOM_LOG_FORMAT") {
            self.logging.format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(StoryError::Config(format!(
                        "STORYLOOM_LOG_FORMAT: expected text or json, got '{format}'"
                    )))
                }
            };
        }

        let openai_key = get("OPENAI_API_KEY");
        if self.provider.api_key.is_none() {
            self.provider.api_key = match self.provider.kind {
                ProviderKind::OpenAi => openai_key.clone(),
                ProviderKind::Gemini => get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            };
        }
        if self.speech.api_key.is_none() {
            self.speech.api_key = openai_key.clone();
        }
        if self.image.api_key.is_none() {
            self.image.api_key = openai_key;
        }
        Ok(())
    }

    /// Key for the OpenAI media endpoints: the section key, else the
    /// provider key when the provider is OpenAI.
    pub fn media_api_key<'a>(&'a self, section_key: Option<&'a str>) -> Option<&'a str> {
        section_key.filter(|k| !k.is_empty()).or_else(|| {
            if self.provider.kind == ProviderKind::OpenAi {
                self.provider.api_key.as_deref().filter(|k| !k.is_empty())
            } else {
                None
            }
        })
    }

    /// Copy with all secrets replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in [
            &mut copy.provider.api_key,
            &mut copy.speech.api_key,
            &mut copy.image.api_key,
        ] {
            if key.is_some() {
                *key = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
