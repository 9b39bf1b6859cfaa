//! Language-learning stories: catalog of choices, prompt building, response
//! validation, and the cache-aware service tying them together.

pub mod catalog;
pub mod parse;
pub mod request;
pub mod service;

pub use catalog::{Language, Level, StoryLength, Topic};
pub use parse::{parse_story_response, split_sections, StoryResponse, StorySections, VocabularyEntry};
pub use request::StoryRequest;
pub use service::{GenerationSettings, Narration, StoryOutcome, StoryService};
