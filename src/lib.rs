//! storyloom: language-learning stories from an LLM, with a persistent
//! response cache.
//!
//! A [`story::StoryRequest`] is turned into a completion request, hashed into a
//! [`cache::CacheKey`], and looked up in the [`cache::ResponseCache`] before any
//! upstream call is made.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod providers;
pub mod story;

pub use error::{Result, StoryError};
