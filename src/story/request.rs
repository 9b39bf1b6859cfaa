//! A learner's story selections and the prompt built from them.

use serde::{Deserialize, Serialize};

use super::catalog::{Language, Level, StoryLength, Topic};
use crate::error::{Result, StoryError};
use crate::providers::CompletionRequest;

/// System instruction sent with every story prompt.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant that creates language learning stories.";

/// Everything the learner picked. Construct with [`StoryRequest::new`] so the
/// grammar structure is always one the level offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub native: Language,
    pub target: Language,
    pub level: Level,
    pub topic: Topic,
    pub length: StoryLength,
    pub grammar: String,
    /// Named characters the story should feature. Empty leaves them to the model.
    #[serde(default)]
    pub characters: Vec<String>,
}

impl StoryRequest {
    /// Validate the selections. `grammar` defaults to the level's first structure.
    pub fn new(
        native: Language,
        target: Language,
        level: Level,
        topic: Topic,
        length: StoryLength,
        grammar: Option<&str>,
    ) -> Result<Self> {
        if !native.is_native_choice() {
            return Err(StoryError::InvalidRequest(format!(
                "{native} is not offered as a native language"
            )));
        }
        if !target.is_target_choice() {
            return Err(StoryError::InvalidRequest(format!(
                "{target} is not offered as a language to learn"
            )));
        }
        if native == target {
            return Err(StoryError::InvalidRequest(
                "Native and target language must differ".into(),
            ));
        }

        let grammar = match grammar {
            Some(wanted) => level.find_grammar(wanted).ok_or_else(|| {
                StoryError::InvalidRequest(format!(
                    "'{}' is not a {} grammar structure. Choose one of: {}",
                    wanted,
                    level,
                    level.grammar().join(", ")
                ))
            })?,
            None => level.grammar()[0],
        };

        Ok(Self {
            native,
            target,
            level,
            topic,
            length,
            grammar: grammar.to_string(),
            characters: Vec::new(),
        })
    }

    /// Feature these characters in the story. Blank names are dropped.
    pub fn with_characters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.characters = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        self
    }

    /// Parse free-form CLI values, then validate as in [`StoryRequest::new`].
    pub fn parse(
        native: &str,
        target: &str,
        level: &str,
        topic: &str,
        length: &str,
        grammar: Option<&str>,
    ) -> Result<Self> {
        Self::new(
            native.parse()?,
            target.parse()?,
            level.parse()?,
            topic.parse()?,
            length.parse()?,
            grammar,
        )
    }

    /// The user prompt sent to the model.
    pub fn instruction(&self) -> String {
        let Self {
            native,
            target,
            level,
            topic,
            length,
            grammar,
            characters,
        } = self;
        let cast = if characters.is_empty() {
            String::new()
        } else {
            format!("The main characters are: {}.\n", characters.join(", "))
        };
        format!(
            "Write a {length} story in {target} for a {level} level learner about {topic}.\n\
             Include the following vocabulary: {words}. Use the grammatical structure: {grammar}.\n\
             {cast}\
             Provide a clear translation of the story in {native}.\n\
             Write each version as three paragraphs (introduction, development, conclusion) \
             separated by a single blank line.\n\
             Respond with only a JSON object with the fields \"original_story\" (the story in {target}), \
             \"translated_story\" (the translation in {native}) and \"vocabulary\" \
             (a list of objects with \"word\" and \"translation\" for the key {target} words used).",
            words = level.vocabulary().join(", "),
        )
    }

    /// Full completion call for this request; its serialized form is the cache payload.
    pub fn completion_request(
        &self,
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            system: SYSTEM_INSTRUCTION.to_string(),
            instruction: self.instruction(),
            max_tokens,
            temperature,
        }
    }

    /// Prompt for the story illustration.
    pub fn illustration_prompt(&self) -> String {
        format!("{}, as a story illustration", self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cache_key;

    fn b1_travel() -> StoryRequest {
        StoryRequest::new(
            Language::Turkish,
            Language::Spanish,
            Level::B1,
            Topic::Travel,
            StoryLength::Short,
            Some("present perfect"),
        )
        .unwrap()
    }

    #[test]
    fn test_new_normalizes_grammar_case() {
        assert_eq!(b1_travel().grammar, "Present Perfect");
    }

    #[test]
    fn test_new_defaults_grammar_to_first_structure() {
        let req = StoryRequest::new(
            Language::English,
            Language::German,
            Level::C2,
            Topic::History,
            StoryLength::Long,
            None,
        )
        .unwrap();
        assert_eq!(req.grammar, "Inversions");
    }

    #[test]
    fn test_new_rejects_grammar_from_other_level() {
        let err = StoryRequest::new(
            Language::Turkish,
            Language::Spanish,
            Level::A1,
            Topic::Travel,
            StoryLength::Short,
            Some("Reported Speech"),
        )
        .unwrap_err();
        assert!(matches!(err, StoryError::InvalidRequest(_)));
    }

    #[test]
    fn test_new_rejects_unoffered_languages() {
        let spanish_native = StoryRequest::new(
            Language::Spanish,
            Language::English,
            Level::A1,
            Topic::Travel,
            StoryLength::Short,
            None,
        );
        assert!(spanish_native.is_err());

        let same = StoryRequest::new(
            Language::English,
            Language::English,
            Level::A1,
            Topic::Travel,
            StoryLength::Short,
            None,
        );
        assert!(same.is_err());
    }

    #[test]
    fn test_parse_from_strings() {
        let req = StoryRequest::parse("turkish", "spanish", "b1", "travel", "short", None).unwrap();
        assert_eq!(req.level, Level::B1);
        assert_eq!(req.topic, Topic::Travel);
        assert!(StoryRequest::parse("turkish", "spanish", "b1", "travel", "huge", None).is_err());
    }

    #[test]
    fn test_instruction_mentions_every_selection() {
        let text = b1_travel().instruction();
        assert!(text.contains("short story in Spanish"));
        assert!(text.contains("B1 level learner about Travel"));
        assert!(text.contains("opportunity, decision, experience, project, future"));
        assert!(text.contains("Present Perfect"));
        assert!(text.contains("translation of the story in Turkish"));
        assert!(text.contains("original_story"));
    }

    #[test]
    fn test_equal_requests_share_cache_key() {
        let a = b1_travel().completion_request("gpt-3.5-turbo", 1000, 0.7);
        let b = b1_travel().completion_request("gpt-3.5-turbo", 1000, 0.7);
        assert_eq!(cache_key(&a).unwrap(), cache_key(&b).unwrap());
    }

    #[test]
    fn test_any_changed_selection_changes_cache_key() {
        let base = cache_key(&b1_travel().completion_request("gpt-3.5-turbo", 1000, 0.7)).unwrap();

        let mut other_topic = b1_travel();
        other_topic.topic = Topic::Health;
        let mut other_length = b1_travel();
        other_length.length = StoryLength::Long;

        for changed in [
            other_topic.completion_request("gpt-3.5-turbo", 1000, 0.7),
            other_length.completion_request("gpt-3.5-turbo", 1000, 0.7),
            b1_travel().completion_request("gpt-4o-mini", 1000, 0.7),
            b1_travel().completion_request("gpt-3.5-turbo", 500, 0.7),
            b1_travel().completion_request("gpt-3.5-turbo", 1000, 0.2),
        ] {
            assert_ne!(base, cache_key(&changed).unwrap());
        }
    }

    #[test]
    fn test_characters_reach_prompt_and_cache_key() {
        let plain = b1_travel();
        let cast = b1_travel().with_characters(["Ana", "  ", " Luis "]);
        assert_eq!(cast.characters, vec!["Ana", "Luis"]);
        assert!(cast.instruction().contains("The main characters are: Ana, Luis."));
        assert!(!plain.instruction().contains("main characters"));

        let key = |r: &StoryRequest| {
            cache_key(&r.completion_request("gpt-3.5-turbo", 1000, 0.7)).unwrap()
        };
        assert_ne!(key(&plain), key(&cast));
        assert_ne!(key(&cast), key(&b1_travel().with_characters(["Ana", "Marta"])));
        assert_eq!(key(&plain), key(&b1_travel().with_characters(Vec::<String>::new())));
    }

    #[test]
    fn test_illustration_prompt() {
        assert_eq!(b1_travel().illustration_prompt(), "Travel, as a story illustration");
    }
}
