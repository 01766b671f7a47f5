//! Raw-text pre-fill: regex heuristics for a handful of contact fields.
//!
//! Only free-text questions whose label names the field are filled, and only
//! with what the text actually contains. Finding nothing is a normal outcome.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::survey::filter::visible_questions;
use crate::survey::model::{AnswerValue, ResponseMap, Survey};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b").unwrap()
});

// Most specific titles first so "software engineer" wins over "engineer".
static JOB_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(software engineer|data scientist|data analyst|product manager|project manager|ux designer|graphic designer|account manager|marketing manager|business analyst|consultant|developer|engineer|designer|analyst|manager|director|teacher|nurse|accountant)\b",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    Phone,
    JobTitle,
}

impl Field {
    const ALL: [Field; 3] = [Field::Email, Field::Phone, Field::JobTitle];

    fn label_terms(self) -> &'static [&'static str] {
        match self {
            Field::Email => &["email", "e-mail"],
            Field::Phone => &["phone", "mobile", "telephone"],
            Field::JobTitle => &["job title", "current role", "position", "occupation"],
        }
    }

    fn find(self, text: &str) -> Option<String> {
        let re = match self {
            Field::Email => &*EMAIL_RE,
            Field::Phone => &*PHONE_RE,
            Field::JobTitle => &*JOB_TITLE_RE,
        };
        re.find(text).map(|m| m.as_str().trim().to_string())
    }
}

pub fn extract_from_text(survey: &Survey, text: &str) -> ResponseMap {
    let mut out = ResponseMap::new();
    let questions: Vec<_> = survey
        .sections
        .iter()
        .flat_map(visible_questions)
        .filter(|q| q.kind.is_free_text())
        .collect();

    for field in Field::ALL {
        let target = questions.iter().find(|q| {
            let label = q.label.to_lowercase();
            !out.contains_key(&q.id) && field.label_terms().iter().any(|t| label.contains(t))
        });
        let Some(target) = target else { continue };
        if let Some(found) = field.find(text) {
            out.insert(target.id.clone(), AnswerValue::Text(found));
        }
    }
    out
}
