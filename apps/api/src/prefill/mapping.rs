//! Structured pre-fill: validates an AI-produced field map against the survey.
//!
//! Values for choice questions must resolve to one of the configured choices
//! (matched case-insensitively, stored in the configured spelling). Anything
//! that does not fit its question is dropped silently.

use serde_json::{Map, Value};

use crate::survey::completion::is_full_permutation;
use crate::survey::filter::visible_questions;
use crate::survey::model::{AnswerValue, ChoiceAnswer, ChoiceConfig, Question, QuestionKind, ResponseMap, Survey};

pub fn map_structured_fields(survey: &Survey, fields: &Map<String, Value>) -> ResponseMap {
    survey
        .sections
        .iter()
        .flat_map(visible_questions)
        .filter_map(|q| {
            let raw = fields.get(&q.id)?;
            coerce(q, raw).map(|v| (q.id.clone(), v))
        })
        .collect()
}

/// Converts a raw JSON value into the answer shape `question` expects.
pub fn coerce(question: &Question, raw: &Value) -> Option<AnswerValue> {
    match &question.kind {
        QuestionKind::ShortText | QuestionKind::LongText => text_of(raw).map(AnswerValue::Text),
        QuestionKind::Number => number_of(raw).map(AnswerValue::Number),
        QuestionKind::Dropdown(config) | QuestionKind::SingleChoice(config) => raw
            .as_str()
            .and_then(|s| canonical_choice(config, s))
            .map(AnswerValue::Text),
        QuestionKind::MultiChoice(config) => {
            let mut picked: Vec<ChoiceAnswer> = Vec::new();
            for s in strings_of(raw) {
                if let Some(choice) = canonical_choice(config, &s) {
                    let entry = ChoiceAnswer::Choice(choice);
                    if !picked.contains(&entry) {
                        picked.push(entry);
                    }
                }
            }
            if let Some(max) = config.max_selections {
                picked.truncate(max);
            }
            (!picked.is_empty()).then_some(AnswerValue::Choices(picked))
        }
        QuestionKind::RatingScale(config) => number_of(raw)
            .map(|n| n.round() as i64)
            .filter(|n| (config.min..=config.max).contains(n))
            .map(|n| AnswerValue::Number(n as f64)),
        QuestionKind::Ranking(config) => {
            let ranked: Vec<String> = strings_of(raw)
                .iter()
                .filter_map(|s| {
                    config
                        .items
                        .iter()
                        .find(|item| item.eq_ignore_ascii_case(s.trim()))
                        .cloned()
                })
                .collect();
            is_full_permutation(&ranked, &config.items).then_some(AnswerValue::Ranking(ranked))
        }
    }
}

fn canonical_choice(config: &ChoiceConfig, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    config
        .choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(candidate))
        .cloned()
}

fn text_of(raw: &Value) -> Option<String> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) => strings_of(raw).join(", "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn number_of(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// A list of strings from an array, or a single string split on commas.
/// Array entries may also be stored choice answers (`{"choice": ".."}`).
fn strings_of(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().or_else(|| v.get("choice").and_then(Value::as_str)))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
