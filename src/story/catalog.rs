//! Fixed choices offered to the learner: levels, topics, lengths, languages.
//!
//! Each CEFR level carries five vocabulary words and three grammar structures
//! that the generated story is asked to use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoryError;

/// CEFR proficiency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::A1,
        Level::A2,
        Level::B1,
        Level::B2,
        Level::C1,
        Level::C2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }

    /// Words the story should include.
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            Self::A1 => &["hello", "world", "apple", "school", "friend"],
            Self::A2 => &["travel", "book", "restaurant", "family", "weekend"],
            Self::B1 => &["opportunity", "decision", "experience", "project", "future"],
            Self::B2 => &["analysis", "consequence", "perspective", "strategy", "negotiation"],
            Self::C1 => &["innovation", "collaboration", "philosophy", "leadership", "phenomenon"],
            Self::C2 => &["sustainability", "paradigm", "aesthetic", "existentialism", "dialectical"],
        }
    }

    /// Grammar structures the learner may pick from.
    pub fn grammar(&self) -> &'static [&'static str] {
        match self {
            Self::A1 => &["Present Simple", "Past Simple", "There is/are"],
            Self::A2 => &["Present Continuous", "Future Simple", "Modal Verbs (can, must)"],
            Self::B1 => &["Present Perfect", "Past Continuous", "Conditionals (Type 1)"],
            Self::B2 => &["Passive Voice", "Conditionals (Type 2)", "Reported Speech"],
            Self::C1 => &["Advanced Passive Structures", "Mixed Conditionals", "Subjunctive Mood"],
            Self::C2 => &["Inversions", "Advanced Modals", "Cleft Sentences"],
        }
    }

    /// Match `input` against this level's grammar list, ignoring case.
    pub fn find_grammar(&self, input: &str) -> Option<&'static str> {
        let wanted = input.trim();
        self.grammar()
            .iter()
            .copied()
            .find(|g| g.eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StoryError::InvalidRequest(format!(
                    "Unknown level '{}'. Choose one of: A1, A2, B1, B2, C1, C2",
                    s
                ))
            })
    }
}

/// Story subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    DailyLife,
    Travel,
    WorkAndCareer,
    Education,
    Health,
    NatureAndEnvironment,
    ScienceAndTechnology,
    ArtAndCulture,
    History,
    FamilyAndRelationships,
    Sports,
    Entertainment,
    Politics,
    Recipes,
}

impl Topic {
    pub const ALL: [Topic; 14] = [
        Topic::DailyLife,
        Topic::Travel,
        Topic::WorkAndCareer,
        Topic::Education,
        Topic::Health,
        Topic::NatureAndEnvironment,
        Topic::ScienceAndTechnology,
        Topic::ArtAndCulture,
        Topic::History,
        Topic::FamilyAndRelationships,
        Topic::Sports,
        Topic::Entertainment,
        Topic::Politics,
        Topic::Recipes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::DailyLife => "Daily Life",
            Self::Travel => "Travel",
            Self::WorkAndCareer => "Work and Career",
            Self::Education => "Education",
            Self::Health => "Health",
            Self::NatureAndEnvironment => "Nature and Environment",
            Self::ScienceAndTechnology => "Science and Technology",
            Self::ArtAndCulture => "Art and Culture",
            Self::History => "History",
            Self::FamilyAndRelationships => "Family and Relationships",
            Self::Sports => "Sports",
            Self::Entertainment => "Entertainment",
            Self::Politics => "Politics",
            Self::Recipes => "Recipes",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Topic {
    type Err = StoryError;

    /// Accepts the label in any case, with `-` or `_` in place of spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_choice(s);
        Self::ALL
            .into_iter()
            .find(|t| normalize_choice(t.label()) == wanted)
            .ok_or_else(|| {
                StoryError::InvalidRequest(format!(
                    "Unknown topic '{}'. Run `storyloom catalog` to list topics",
                    s
                ))
            })
    }
}

/// Requested story length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryLength {
    #[default]
    Short,
    Medium,
    Long,
}

impl StoryLength {
    pub const ALL: [StoryLength; 3] = [StoryLength::Short, StoryLength::Medium, StoryLength::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryLength {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StoryError::InvalidRequest(format!(
                    "Unknown length '{}'. Choose one of: short, medium, long",
                    s
                ))
            })
    }
}

/// Languages a learner can read in or study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Turkish,
    English,
    German,
    French,
    Spanish,
}

impl Language {
    /// Languages offered as the learner's own language.
    pub const NATIVE: [Language; 4] = [
        Language::Turkish,
        Language::English,
        Language::German,
        Language::French,
    ];

    /// Languages offered as the language being learned.
    pub const TARGET: [Language; 4] = [
        Language::English,
        Language::German,
        Language::French,
        Language::Spanish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Turkish => "Turkish",
            Self::English => "English",
            Self::German => "German",
            Self::French => "French",
            Self::Spanish => "Spanish",
        }
    }

    pub fn is_native_choice(&self) -> bool {
        Self::NATIVE.contains(self)
    }

    pub fn is_target_choice(&self) -> bool {
        Self::TARGET.contains(self)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Turkish,
            Self::English,
            Self::German,
            Self::French,
            Self::Spanish,
        ]
        .into_iter()
        .find(|l| l.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| StoryError::InvalidRequest(format!("Unsupported language '{}'", s)))
    }
}

fn normalize_choice(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
