//! Request normalizer: canonical JSON text hashed into a [`CacheKey`].
//!
//! Object keys are sorted at every depth before hashing, so two payloads that
//! differ only in field order produce the same key. The canonical text uses
//! `", "` and `": "` as separators, which makes
//! `{"instruction": "..."}` hash exactly like the same literal string.
//!
//! Non-ASCII text is written as raw UTF-8, not `\uXXXX` escapes, so keys for
//! Turkish or Spanish payloads differ from an ASCII-escaped rendering of the
//! same object. Keys are only comparable with keys this module produced.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex-encoded SHA-256 digest of a canonical request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 bytes, for log fields. Keys read back from disk are not
    /// guaranteed to be hex, so this never slices inside a character.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the cache key for any serializable request payload.
pub fn cache_key<T: Serialize + ?Sized>(payload: &T) -> Result<CacheKey> {
    let value = serde_json::to_value(payload)?;
    let text = canonical_string(&value)?;
    Ok(key_for_text(&text))
}

/// Hash an already-canonical string.
pub fn key_for_text(text: &str) -> CacheKey {
    CacheKey(hex::encode(Sha256::digest(text.as_bytes())))
}

/// Render `value` as canonical JSON text.
pub fn canonical_string(value: &Value) -> Result<String> {
    let canonical = canonicalize(value);
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    canonical.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Return a copy of `value` with every object's keys in sorted order.
///
/// Arrays keep their order; element order is meaningful.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with a single space after `,` and `:`.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_on_non_hex_key_from_disk() {
        let key: CacheKey = serde_json::from_str(r#""aéééééé""#).unwrap();
        assert_eq!(key.short(), "aéééééé");
        let key: CacheKey = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(key.short(), "abc");
    }

    #[test]
    fn test_non_ascii_is_written_raw() {
        let text = canonical_string(&json!({"topic": "Günlük Yaşam"})).unwrap();
        assert_eq!(text, r#"{"topic": "Günlük Yaşam"}"#);
    }

    #[test]
    fn test_cache_key_deterministic() {
        let payload = json!({"model": "gpt-3.5-turbo", "instruction": "hello"});
        assert_eq!(cache_key(&payload).unwrap(), cache_key(&payload).unwrap());
    }

    #[test]
    fn test_cache_key_ignores_field_order() {
        let a: Value =
            serde_json::from_str(r#"{"a": 1, "b": {"y": [1, 2], "x": "s"}}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"b": {"x": "s", "y": [1, 2]}, "a": 1}"#).unwrap();
        assert_eq!(cache_key(&a).unwrap(), cache_key(&b).unwrap());
    }

    #[test]
    fn test_cache_key_respects_array_order() {
        let a = json!({"words": ["apple", "school"]});
        let b = json!({"words": ["school", "apple"]});
        assert_ne!(cache_key(&a).unwrap(), cache_key(&b).unwrap());
    }

    #[test]
    fn test_cache_key_field_aware() {
        let base = json!({"level": "B1", "topic": "Travel", "length": "Short"});
        let variants = [
            json!({"level": "B2", "topic": "Travel", "length": "Short"}),
            json!({"level": "B1", "topic": "Health", "length": "Short"}),
            json!({"level": "B1", "topic": "Travel", "length": "Long"}),
            json!({"level": "B1", "topic": "Travel"}),
        ];
        let base_key = cache_key(&base).unwrap();
        for v in &variants {
            assert_ne!(base_key, cache_key(v).unwrap(), "{v} collided with base");
        }
    }

    #[test]
    fn test_cache_key_matches_literal_canonical_string() {
        let instruction = "Create a story in Spanish for a B1 level learner...";
        let payload = json!({ "instruction": instruction });
        let literal = format!(r#"{{"instruction": "{instruction}"}}"#);
        let expected = hex::encode(Sha256::digest(literal.as_bytes()));
        assert_eq!(cache_key(&payload).unwrap().as_str(), expected);
    }

    #[test]
    fn test_canonical_string_separators_and_nesting() {
        let value = json!({"b": [1, {"d": null, "c": true}], "a": "x"});
        assert_eq!(
            canonical_string(&value).unwrap(),
            r#"{"a": "x", "b": [1, {"c": true, "d": null}]}"#
        );
    }

    #[test]
    fn test_key_is_64_lowercase_hex() {
        let key = cache_key(&json!({"instruction": "x"})).unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key.short().len(), 8);
    }

    #[test]
    fn test_cache_key_from_struct() {
        #[derive(Serialize)]
        struct Req<'a> {
            topic: &'a str,
            level: &'a str,
        }
        let from_struct = cache_key(&Req {
            topic: "Travel",
            level: "A1",
        })
        .unwrap();
        let from_value = cache_key(&json!({"level": "A1", "topic": "Travel"})).unwrap();
        assert_eq!(from_struct, from_value);
    }
}
