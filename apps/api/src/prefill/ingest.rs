//! Résumé ingestion, the producer side of pre-fill.
//!
//! Upload → S3 original → text extraction → AI field mapping → validated
//! field map stored per user. When the mapping pass fails the extracted text
//! is stored instead, and pre-fill falls back to heuristics.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;
use crate::prefill::extract::{detect_kind, extract_text};
use crate::prefill::mapping::map_structured_fields;
use crate::prefill::prompts::{FIELD_MAPPING_PROMPT, FIELD_MAPPING_SYSTEM};
use crate::prefill::PrefillError;
use crate::survey::filter::visible_questions;
use crate::survey::model::{QuestionKind, Survey};

/// Caps the document text sent to the model.
const MAX_PROMPT_CHARS: usize = 20_000;

/// Maps document text onto survey question ids. Output is unvalidated.
#[async_trait]
pub trait FieldMapper: Send + Sync {
    async fn map_fields(
        &self,
        survey: &Survey,
        document_text: &str,
    ) -> Result<Map<String, Value>, PrefillError>;
}

pub struct LlmFieldMapper(pub LlmClient);

#[async_trait]
impl FieldMapper for LlmFieldMapper {
    async fn map_fields(
        &self,
        survey: &Survey,
        document_text: &str,
    ) -> Result<Map<String, Value>, PrefillError> {
        let document_text: String = document_text.chars().take(MAX_PROMPT_CHARS).collect();
        let prompt = FIELD_MAPPING_PROMPT
            .replace("{questions}", &question_catalogue(survey).to_string())
            .replace("{document_text}", &document_text);
        let system = format!("{FIELD_MAPPING_SYSTEM} {JSON_ONLY_SYSTEM}");
        Ok(self.0.call_json::<Map<String, Value>>(&prompt, &system).await?)
    }
}

/// Visible questions described for the model: id, type, label and options.
pub fn question_catalogue(survey: &Survey) -> Value {
    let questions: Vec<Value> = survey
        .sections
        .iter()
        .flat_map(visible_questions)
        .map(|q| {
            let mut entry = json!({
                "id": q.id,
                "type": q.kind.type_str(),
                "label": q.label,
            });
            match &q.kind {
                QuestionKind::Dropdown(c) | QuestionKind::SingleChoice(c) | QuestionKind::MultiChoice(c) => {
                    entry["choices"] = json!(c.choices);
                    if let Some(max) = c.max_selections {
                        entry["max_selections"] = json!(max);
                    }
                }
                QuestionKind::RatingScale(r) => {
                    entry["min"] = json!(r.min);
                    entry["max"] = json!(r.max);
                }
                QuestionKind::Ranking(r) => entry["items"] = json!(r.items),
                _ => {}
            }
            entry
        })
        .collect();
    Value::Array(questions)
}

pub struct UploadedDocument {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrefillMode {
    Structured,
    RawText,
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub document_id: Uuid,
    pub mode: PrefillMode,
    pub mapped_fields: usize,
}

pub struct IngestParams<'a> {
    pub pool: &'a PgPool,
    pub s3: &'a aws_sdk_s3::Client,
    pub s3_bucket: &'a str,
    pub mapper: &'a dyn FieldMapper,
}

pub async fn ingest_resume(
    params: IngestParams<'_>,
    survey: &Survey,
    user_id: Uuid,
    document: UploadedDocument,
) -> Result<IngestSummary, PrefillError> {
    let IngestParams {
        pool,
        s3,
        s3_bucket,
        mapper,
    } = params;

    let kind = detect_kind(
        document.file_name.as_deref(),
        document.content_type.as_deref(),
        &document.bytes,
    )?;
    let text = extract_text(kind, &document.bytes)?;

    let document_id = Uuid::new_v4();
    let s3_key = format!("resumes/{}/{}.{}", user_id, document_id, kind.extension());
    s3.put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(document.bytes))
        .content_type(kind.content_type())
        .send()
        .await
        .map_err(|e| PrefillError::Storage(format!("S3 upload failed: {e}")))?;

    let (mode, structured) = match mapper.map_fields(survey, &text).await {
        Ok(fields) => {
            let validated = map_structured_fields(survey, &fields);
            let value = serde_json::to_value(&validated)
                .map_err(|e| PrefillError::Storage(format!("Unencodable field map: {e}")))?;
            (PrefillMode::Structured, Some((validated.len(), value)))
        }
        Err(e) => {
            warn!("Field mapping failed for user {user_id}, keeping raw text: {e}");
            (PrefillMode::RawText, None)
        }
    };
    let mapped_fields = structured.as_ref().map_or(0, |(n, _)| *n);

    sqlx::query(
        r#"
        INSERT INTO resume_documents (id, user_id, survey_id, s3_key, raw_text, structured_fields)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(document_id)
    .bind(user_id)
    .bind(survey.id)
    .bind(&s3_key)
    .bind(&text)
    .bind(structured.map(|(_, v)| v))
    .execute(pool)
    .await?;

    info!("Stored résumé {document_id} for user {user_id} ({mapped_fields} mapped fields)");

    Ok(IngestSummary {
        document_id,
        mode,
        mapped_fields,
    })
}
