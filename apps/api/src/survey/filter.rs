use crate::survey::model::{Question, Section};

/// Label terms that hide a question. Legacy survey content asked for license
/// keys inside the questionnaire; access is now verified before the survey starts.
const HIDDEN_LABEL_TERMS: &[&str] = &[
    "license",
    "licence",
    "access code",
    "activation code",
    "product key",
];

pub fn is_hidden(question: &Question) -> bool {
    let label = question.label.to_lowercase();
    HIDDEN_LABEL_TERMS.iter().any(|term| label.contains(term))
}

/// Questions of a section that are shown to the user, in section order.
/// All position arithmetic runs on this list.
pub fn visible_questions(section: &Section) -> Vec<&Question> {
    section.questions.iter().filter(|q| !is_hidden(q)).collect()
}

pub fn visible_count(section: &Section) -> usize {
    section.questions.iter().filter(|q| !is_hidden(q)).count()
}
