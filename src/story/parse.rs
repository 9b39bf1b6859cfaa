//! Parse-and-validate for model output.
//!
//! Raw model text is turned into a [`StoryResponse`] before any field is
//! read. Section splitting on blank lines is kept in [`split_sections`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoryError};

/// Placeholder used when the model returned no introduction.
pub const MISSING_INTRODUCTION: &str = "Introduction section not found.";
/// Placeholder used when the model returned no development section.
pub const MISSING_DEVELOPMENT: &str = "Development section not found.";
/// Placeholder used when the model returned no conclusion.
pub const MISSING_CONCLUSION: &str = "Conclusion section not found.";

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid code fence regex")
});

/// One word the model highlighted, with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    pub translation: String,
}

/// Validated story payload. This is what the response cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryResponse {
    pub original_story: String,
    pub translated_story: String,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyEntry>,
}

/// A story cut into its three expected parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySections {
    pub introduction: String,
    pub development: String,
    pub conclusion: String,
}

/// Convert raw model text into a [`StoryResponse`].
///
/// Accepts a bare JSON object, one wrapped in a Markdown code fence, or one
/// surrounded by prose. Fails with [`StoryError::ResponseShape`] otherwise.
pub fn parse_story_response(raw: &str) -> Result<StoryResponse> {
    let value = extract_json_object(raw)?;
    validate_story_value(&value)
}

/// Check that `value` has the story shape and convert it.
///
/// Also used on cache hits, since entries written by older builds may differ.
pub fn validate_story_value(value: &Value) -> Result<StoryResponse> {
    let obj = value
        .as_object()
        .ok_or_else(|| shape_error("response is not a JSON object"))?;

    let original_story = required_text(obj, "original_story")?;
    let translated_story = required_text(obj, "translated_story")?;

    let vocabulary = match obj.get("vocabulary") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value::<VocabularyEntry>(item.clone()).map_err(|e| {
                    shape_error(&format!("vocabulary[{i}] is not {{word, translation}}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(shape_error("`vocabulary` is not a list")),
    };

    Ok(StoryResponse {
        original_story,
        translated_story,
        vocabulary,
    })
}

/// Split a story into introduction, development, and conclusion on `"\n\n"`.
///
/// Pieces beyond the third are ignored. Missing pieces are replaced by the
/// `MISSING_*` placeholders.
pub fn split_sections(text: &str) -> StorySections {
    let parts: Vec<&str> = text.split("\n\n").collect();
    let part = |i: usize, placeholder: &str| {
        parts
            .get(i)
            .map_or_else(|| placeholder.to_string(), |p| (*p).to_string())
    };
    StorySections {
        introduction: part(0, MISSING_INTRODUCTION),
        development: part(1, MISSING_DEVELOPMENT),
        conclusion: part(2, MISSING_CONCLUSION),
    }
}

fn extract_json_object(raw: &str) -> Result<Value> {
    let body = match CODE_FENCE_RE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => raw.trim(),
    };
    if body.is_empty() {
        return Err(shape_error("response was empty"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    // Models sometimes wrap the object in a sentence or two.
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
            .map_err(|e| shape_error(&format!("response is not valid JSON: {e}"))),
        _ => Err(shape_error("response does not contain a JSON object")),
    }
}

fn required_text(obj: &serde_json::Map<String, Value>, field: &str) -> Result<String> {
    match obj.get(field).and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(_) => Err(shape_error(&format!("`{field}` is empty"))),
        None => Err(shape_error(&format!("missing string field `{field}`"))),
    }
}

fn shape_error(detail: &str) -> StoryError {
    StoryError::ResponseShape(detail.to_string())
}
