use std::collections::HashSet;

use crate::survey::model::{AnswerValue, ChoiceAnswer, Question, QuestionKind};

/// Decides whether the user may move past a question.
///
/// COMPLETE when:
/// - the question is not required
/// - multi-choice: selected count >= `min_selections` (>= 1 without a minimum)
///   and, when `max_selections` is set, count <= max
/// - ranking: the value is a full permutation of the configured items
/// - anything else: a value is present and is not an empty string
pub fn is_question_complete(question: &Question, value: Option<&AnswerValue>) -> bool {
    if !question.required {
        return true;
    }

    match &question.kind {
        QuestionKind::MultiChoice(config) => {
            let count = value
                .and_then(AnswerValue::choices)
                .map(count_selections)
                .unwrap_or(0);
            let min = config.min_selections.unwrap_or(1);
            let within_max = config.max_selections.map_or(true, |max| count <= max);
            count >= min && within_max
        }
        QuestionKind::Ranking(config) => value
            .and_then(AnswerValue::ranking)
            .map(|ranked| is_full_permutation(ranked, &config.items))
            .unwrap_or(false),
        QuestionKind::SingleChoice(_) | QuestionKind::Dropdown(_) => match value {
            Some(AnswerValue::Choices(entries)) => {
                entries.len() == 1 && !entries[0].text().is_empty()
            }
            other => is_present(other),
        },
        _ => is_present(value),
    }
}

fn is_present(value: Option<&AnswerValue>) -> bool {
    match value {
        None => false,
        Some(AnswerValue::Text(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Blank "other" entries do not count as a selection.
fn count_selections(entries: &[ChoiceAnswer]) -> usize {
    entries
        .iter()
        .filter(|e| match e {
            ChoiceAnswer::Choice(_) => true,
            ChoiceAnswer::Other(text) => !text.trim().is_empty(),
        })
        .count()
}

pub fn is_full_permutation(ranked: &[String], items: &[String]) -> bool {
    if ranked.len() != items.len() {
        return false;
    }
    let expected: HashSet<&str> = items.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(ranked.len());
    ranked
        .iter()
        .all(|r| expected.contains(r.as_str()) && seen.insert(r.as_str()))
}
