// Prompt templates for the résumé field-mapping pass.

pub const FIELD_MAPPING_SYSTEM: &str = "\
You map résumé content onto a career-assessment questionnaire. \
Only answer a question when the résumé states the answer directly. \
For choice questions you MUST copy one of the listed choices verbatim; \
never invent a choice. Leave out any question you cannot answer confidently.";

pub const FIELD_MAPPING_PROMPT: &str = r#"Fill in as many of the following questions as the résumé supports.

QUESTIONS (JSON):
{questions}

RÉSUMÉ TEXT:
{document_text}

OUTPUT: a single JSON object keyed by question "id".
- short_text / long_text: a string
- number / rating_scale: a number (rating within the given min and max)
- dropdown / single_choice: one string from "choices"
- multi_choice: an array of strings from "choices" (at most "max_selections")
- ranking: an array containing every entry of "items", most important first
Omit questions you cannot answer. Return {} if nothing applies."#;
