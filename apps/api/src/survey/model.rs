//! Survey definition and answer types.
//!
//! A `Survey` is immutable once loaded. Answers are keyed by question id in a
//! `ResponseMap`, with the value shape fixed by the question's kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub label: String,
    pub required: bool,
    pub order: i32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question type tag plus its typed configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    Number,
    Dropdown(ChoiceConfig),
    SingleChoice(ChoiceConfig),
    MultiChoice(ChoiceConfig),
    RatingScale(RatingConfig),
    Ranking(RankingConfig),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChoiceConfig {
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub allow_other: bool,
    #[serde(default)]
    pub min_selections: Option<usize>,
    #[serde(default)]
    pub max_selections: Option<usize>,
}

impl ChoiceConfig {
    pub fn contains(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| c == choice)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingConfig {
    #[serde(default = "default_rating_min")]
    pub min: i64,
    #[serde(default = "default_rating_max")]
    pub max: i64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            min: default_rating_min(),
            max: default_rating_max(),
        }
    }
}

fn default_rating_min() -> i64 {
    1
}

fn default_rating_max() -> i64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    #[serde(default)]
    pub items: Vec<String>,
}

impl QuestionKind {
    pub fn type_str(&self) -> &'static str {
        match self {
            QuestionKind::ShortText => "short_text",
            QuestionKind::LongText => "long_text",
            QuestionKind::Number => "number",
            QuestionKind::Dropdown(_) => "dropdown",
            QuestionKind::SingleChoice(_) => "single_choice",
            QuestionKind::MultiChoice(_) => "multi_choice",
            QuestionKind::RatingScale(_) => "rating_scale",
            QuestionKind::Ranking(_) => "ranking",
        }
    }

    /// Builds a kind from the store's type tag and open JSON config blob.
    /// Unknown tags fall back to short text; malformed configs fall back to defaults.
    pub fn from_parts(type_tag: &str, config: Option<&serde_json::Value>) -> Self {
        fn decode<T: serde::de::DeserializeOwned + Default>(
            config: Option<&serde_json::Value>,
        ) -> T {
            config
                .and_then(|c| serde_json::from_value(c.clone()).ok())
                .unwrap_or_default()
        }

        match type_tag {
            "long_text" | "textarea" => QuestionKind::LongText,
            "number" => QuestionKind::Number,
            "dropdown" | "select" => QuestionKind::Dropdown(decode(config)),
            "single_choice" | "radio" => QuestionKind::SingleChoice(decode(config)),
            "multi_choice" | "checkbox" => QuestionKind::MultiChoice(decode(config)),
            "rating_scale" | "rating" => QuestionKind::RatingScale(decode(config)),
            "ranking" => QuestionKind::Ranking(decode(config)),
            _ => QuestionKind::ShortText,
        }
    }

    pub fn is_free_text(&self) -> bool {
        matches!(self, QuestionKind::ShortText | QuestionKind::LongText)
    }
}

/// A single entry of a choice answer. Free text typed into an "other" field
/// is kept apart from configured choices, even when the strings collide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceAnswer {
    Choice(String),
    Other(String),
}

impl ChoiceAnswer {
    pub fn text(&self) -> &str {
        match self {
            ChoiceAnswer::Choice(s) | ChoiceAnswer::Other(s) => s,
        }
    }
}

/// An answer value. Untagged on the wire so a payload reads
/// `{"q1": "Y", "q2": ["B", "A", "C"]}`.
///
/// Variant order matters for deserialization: an empty array decodes as
/// `Choices(vec![])`, which every reader treats as "nothing selected".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Choices(Vec<ChoiceAnswer>),
    Ranking(Vec<String>),
}

impl AnswerValue {
    /// Selected entries of a choice answer. An empty ranking reads as no selection.
    pub fn choices(&self) -> Option<&[ChoiceAnswer]> {
        match self {
            AnswerValue::Choices(c) => Some(c),
            AnswerValue::Ranking(r) if r.is_empty() => Some(&[]),
            _ => None,
        }
    }

    /// Ordered items of a ranking answer. An empty choice list reads as an empty ranking.
    pub fn ranking(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Ranking(r) => Some(r),
            AnswerValue::Choices(c) if c.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

pub type ResponseMap = BTreeMap<String, AnswerValue>;
