//! Question controls: which input a question needs and how a user interaction
//! turns into a new answer value.
//!
//! `apply` is stateless. It returns `None` when the interaction is refused, in
//! which case no change is reported and the current value stands.

use serde::{Deserialize, Serialize};

use crate::survey::model::{AnswerValue, ChoiceAnswer, ChoiceConfig, Question, QuestionKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    TextInput,
    TextArea,
    NumberInput,
    Select,
    RadioGroup,
    CheckboxGroup,
    RatingScale,
    RankingList,
}

pub fn control_for(question: &Question) -> ControlKind {
    match question.kind {
        QuestionKind::ShortText => ControlKind::TextInput,
        QuestionKind::LongText => ControlKind::TextArea,
        QuestionKind::Number => ControlKind::NumberInput,
        QuestionKind::Dropdown(_) => ControlKind::Select,
        QuestionKind::SingleChoice(_) => ControlKind::RadioGroup,
        QuestionKind::MultiChoice(_) => ControlKind::CheckboxGroup,
        QuestionKind::RatingScale(_) => ControlKind::RatingScale,
        QuestionKind::Ranking(_) => ControlKind::RankingList,
    }
}

/// A single user interaction with a question control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Interaction {
    SetText { text: String },
    SetNumber { value: f64 },
    Select { choice: String },
    Toggle { choice: String },
    /// Free text for the "other" option. Empty text removes the entry.
    SetOther { text: String },
    Rate { value: i64 },
    /// Drag reordering: move the item at `from` to position `to`.
    Move { from: usize, to: usize },
    /// Explicit rank selector: put `item` at zero-based `rank`.
    AssignRank { item: String, rank: usize },
    /// Accepts the ranking as displayed, which is the configured order until edited.
    ConfirmOrder,
}

pub fn apply(
    question: &Question,
    current: Option<&AnswerValue>,
    interaction: Interaction,
) -> Option<AnswerValue> {
    match (&question.kind, interaction) {
        (QuestionKind::ShortText | QuestionKind::LongText, Interaction::SetText { text }) => {
            Some(AnswerValue::Text(text))
        }
        (QuestionKind::Number, Interaction::SetNumber { value }) if value.is_finite() => {
            Some(AnswerValue::Number(value))
        }
        (
            QuestionKind::Dropdown(config) | QuestionKind::SingleChoice(config),
            Interaction::Select { choice },
        ) if config.contains(&choice) => Some(AnswerValue::Text(choice)),
        (
            QuestionKind::Dropdown(config) | QuestionKind::SingleChoice(config),
            Interaction::SetOther { text },
        ) if config.allow_other => {
            if text.is_empty() {
                Some(AnswerValue::Text(String::new()))
            } else {
                Some(AnswerValue::Choices(vec![ChoiceAnswer::Other(text)]))
            }
        }
        (QuestionKind::MultiChoice(config), Interaction::Toggle { choice }) => {
            toggle_choice(config, current, choice)
        }
        (QuestionKind::MultiChoice(config), Interaction::SetOther { text }) if config.allow_other => {
            set_other(config, current, text)
        }
        (QuestionKind::RatingScale(config), Interaction::Rate { value })
            if (config.min..=config.max).contains(&value) =>
        {
            Some(AnswerValue::Number(value as f64))
        }
        (QuestionKind::Ranking(config), Interaction::Move { from, to }) => {
            let mut order = current_order(current, &config.items);
            if from >= order.len() || to >= order.len() {
                return None;
            }
            let item = order.remove(from);
            order.insert(to, item);
            Some(AnswerValue::Ranking(order))
        }
        (QuestionKind::Ranking(config), Interaction::AssignRank { item, rank }) => {
            let mut order = current_order(current, &config.items);
            let from = order.iter().position(|i| *i == item)?;
            if rank >= order.len() {
                return None;
            }
            // Swap so the displaced item takes the vacated rank.
            order.swap(from, rank);
            Some(AnswerValue::Ranking(order))
        }
        (QuestionKind::Ranking(config), Interaction::ConfirmOrder) => {
            Some(AnswerValue::Ranking(current_order(current, &config.items)))
        }
        _ => None,
    }
}

fn selections(current: Option<&AnswerValue>) -> Vec<ChoiceAnswer> {
    current
        .and_then(AnswerValue::choices)
        .map(<[ChoiceAnswer]>::to_vec)
        .unwrap_or_default()
}

fn toggle_choice(
    config: &ChoiceConfig,
    current: Option<&AnswerValue>,
    choice: String,
) -> Option<AnswerValue> {
    if !config.contains(&choice) {
        return None;
    }
    let mut selected = selections(current);
    let entry = ChoiceAnswer::Choice(choice);
    if let Some(pos) = selected.iter().position(|s| *s == entry) {
        selected.remove(pos);
        return Some(AnswerValue::Choices(selected));
    }
    if config.max_selections.is_some_and(|max| selected.len() >= max) {
        return None;
    }
    selected.push(entry);
    Some(AnswerValue::Choices(selected))
}

fn set_other(
    config: &ChoiceConfig,
    current: Option<&AnswerValue>,
    text: String,
) -> Option<AnswerValue> {
    let mut selected = selections(current);
    let existing = selected
        .iter()
        .position(|s| matches!(s, ChoiceAnswer::Other(_)));
    match (existing, text.is_empty()) {
        (Some(pos), true) => {
            selected.remove(pos);
        }
        (Some(pos), false) => selected[pos] = ChoiceAnswer::Other(text),
        (None, true) => return None,
        (None, false) => {
            if config.max_selections.is_some_and(|max| selected.len() >= max) {
                return None;
            }
            selected.push(ChoiceAnswer::Other(text));
        }
    }
    Some(AnswerValue::Choices(selected))
}

/// The ranking to edit: the stored one if it is a full permutation, otherwise
/// the configured order, so every edit yields a full permutation.
fn current_order(current: Option<&AnswerValue>, items: &[String]) -> Vec<String> {
    current
        .and_then(AnswerValue::ranking)
        .filter(|ranked| crate::survey::completion::is_full_permutation(ranked, items))
        .map(<[String]>::to_vec)
        .unwrap_or_else(|| items.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::completion::is_full_permutation;
    use crate::survey::model::{RankingConfig, RatingConfig};

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: "q".into(),
            label: "Question".into(),
            required: true,
            order: 0,
            kind,
        }
    }

    fn multi(max: Option<usize>, allow_other: bool) -> Question {
        question(QuestionKind::MultiChoice(ChoiceConfig {
            choices: vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect(),
            allow_other,
            min_selections: Some(2),
            max_selections: max,
        }))
    }

    fn toggle(choice: &str) -> Interaction {
        Interaction::Toggle {
            choice: choice.into(),
        }
    }

    fn ranking_question() -> Question {
        question(QuestionKind::Ranking(RankingConfig {
            items: vec!["A".into(), "B".into(), "C".into()],
        }))
    }

    #[test]
    fn test_control_kinds() {
        assert_eq!(control_for(&question(QuestionKind::LongText)), ControlKind::TextArea);
        assert_eq!(control_for(&ranking_question()), ControlKind::RankingList);
        assert_eq!(control_for(&multi(None, false)), ControlKind::CheckboxGroup);
    }

    #[test]
    fn test_multi_choice_refuses_selection_beyond_max() {
        let q = multi(Some(3), false);
        let mut value = None;
        for c in ["a", "b", "c"] {
            value = apply(&q, value.as_ref(), toggle(c));
            assert!(value.is_some());
        }
        assert_eq!(apply(&q, value.as_ref(), toggle("d")), None);
        // Deselecting still works at the cap.
        let fewer = apply(&q, value.as_ref(), toggle("a")).unwrap();
        assert_eq!(fewer.choices().unwrap().len(), 2);
    }

    #[test]
    fn test_multi_choice_rejects_unknown_choice() {
        let q = multi(None, false);
        assert_eq!(apply(&q, None, toggle("z")), None);
    }

    #[test]
    fn test_other_text_is_tagged_and_replaceable() {
        let q = multi(Some(2), true);
        let v = apply(&q, None, toggle("a")).unwrap();
        let v = apply(&q, Some(&v), Interaction::SetOther { text: "a".into() }).unwrap();
        assert_eq!(
            v,
            AnswerValue::Choices(vec![
                ChoiceAnswer::Choice("a".into()),
                ChoiceAnswer::Other("a".into())
            ])
        );
        let v = apply(&q, Some(&v), Interaction::SetOther { text: "Coaching".into() }).unwrap();
        assert_eq!(v.choices().unwrap()[1], ChoiceAnswer::Other("Coaching".into()));
        let v = apply(&q, Some(&v), Interaction::SetOther { text: String::new() }).unwrap();
        assert_eq!(v.choices().unwrap().len(), 1);
    }

    #[test]
    fn test_other_refused_when_not_allowed() {
        let q = multi(None, false);
        assert_eq!(apply(&q, None, Interaction::SetOther { text: "x".into() }), None);
    }

    #[test]
    fn test_single_choice_select() {
        let q = question(QuestionKind::SingleChoice(ChoiceConfig {
            choices: vec!["X".into(), "Y".into()],
            ..Default::default()
        }));
        assert_eq!(
            apply(&q, None, Interaction::Select { choice: "Y".into() }),
            Some(AnswerValue::Text("Y".into()))
        );
        assert_eq!(apply(&q, None, Interaction::Select { choice: "Z".into() }), None);
    }

    #[test]
    fn test_rating_range_enforced() {
        let q = question(QuestionKind::RatingScale(RatingConfig { min: 1, max: 10 }));
        assert_eq!(apply(&q, None, Interaction::Rate { value: 10 }), Some(AnswerValue::Number(10.0)));
        assert_eq!(apply(&q, None, Interaction::Rate { value: 11 }), None);
    }

    #[test]
    fn test_ranking_move_starts_from_configured_order() {
        let q = ranking_question();
        let v = apply(&q, None, Interaction::Move { from: 1, to: 0 }).unwrap();
        assert_eq!(v, AnswerValue::Ranking(vec!["B".into(), "A".into(), "C".into()]));
    }

    #[test]
    fn test_ranking_assign_rank_keeps_permutation() {
        let q = ranking_question();
        let items = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let v = apply(&q, None, Interaction::AssignRank { item: "C".into(), rank: 0 }).unwrap();
        assert_eq!(v, AnswerValue::Ranking(vec!["C".into(), "B".into(), "A".into()]));
        let v = apply(&q, Some(&v), Interaction::AssignRank { item: "A".into(), rank: 1 }).unwrap();
        assert!(is_full_permutation(v.ranking().unwrap(), &items));
        assert_eq!(v, AnswerValue::Ranking(vec!["C".into(), "A".into(), "B".into()]));
    }

    #[test]
    fn test_ranking_out_of_range_refused() {
        let q = ranking_question();
        assert_eq!(apply(&q, None, Interaction::Move { from: 0, to: 3 }), None);
        assert_eq!(
            apply(&q, None, Interaction::AssignRank { item: "Z".into(), rank: 0 }),
            None
        );
    }

    #[test]
    fn test_partial_stored_ranking_is_replaced_by_full_order() {
        let q = ranking_question();
        let partial = AnswerValue::Ranking(vec!["C".into()]);
        let v = apply(&q, Some(&partial), Interaction::Move { from: 0, to: 0 }).unwrap();
        assert_eq!(v, AnswerValue::Ranking(vec!["A".into(), "B".into(), "C".into()]));
    }

    #[test]
    fn test_confirm_order_records_displayed_ranking() {
        let q = ranking_question();
        let v = apply(&q, None, Interaction::ConfirmOrder).unwrap();
        assert_eq!(v, AnswerValue::Ranking(vec!["A".into(), "B".into(), "C".into()]));

        let edited = AnswerValue::Ranking(vec!["C".into(), "A".into(), "B".into()]);
        assert_eq!(apply(&q, Some(&edited), Interaction::ConfirmOrder), Some(edited));
        assert_eq!(
            apply(&question(QuestionKind::ShortText), None, Interaction::ConfirmOrder),
            None
        );
    }

    #[test]
    fn test_mismatched_interaction_refused() {
        let q = question(QuestionKind::Number);
        assert_eq!(apply(&q, None, Interaction::SetText { text: "1".into() }), None);
    }
}
