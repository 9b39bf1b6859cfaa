//! Error types for storyloom.
//!
//! Every fallible library operation returns [`Result`]. CLI handlers wrap
//! these in `anyhow` with additional context.

use std::path::PathBuf;

use thiserror::Error;

use crate::providers::ProviderError;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum StoryError {
    /// The cache backing store exists but could not be read or deserialized.
    #[error("Failed to load response cache from {path}: {reason}")]
    CacheLoad { path: PathBuf, reason: String },

    /// Persisting the cache to disk failed. The in-memory entry is kept.
    #[error("Failed to write response cache to {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upstream model, speech, or image API call failed.
    #[error("Upstream call failed: {0}")]
    Upstream(#[from] ProviderError),

    /// The model answered, but not in the expected structured shape.
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// The story request names a level, topic, grammar, or language we do not offer.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An optional collaborator (speech, image) was used without being configured.
    #[error("{0} is not enabled in the configuration")]
    FeatureDisabled(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoryError {
    /// Whether retrying the same user action could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream(err) if err.is_transient())
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, StoryError>;
