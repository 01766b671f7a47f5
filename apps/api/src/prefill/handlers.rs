//! Axum route handler for résumé upload.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;
use crate::prefill::ingest::{ingest_resume, IngestParams, IngestSummary, UploadedDocument};
use crate::state::AppState;

/// Multipart fields of an upload, before validation.
#[derive(Default)]
struct UploadForm {
    user_id: Option<Uuid>,
    survey_id: Option<Uuid>,
    document: Option<UploadedDocument>,
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("'{field}' must be a UUID")))
}

async fn read_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" | "survey_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                let id = parse_uuid(&name, &text)?;
                if name == "user_id" {
                    form.user_id = Some(id);
                } else {
                    form.survey_id = Some(id);
                }
            }
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                if bytes.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(max_bytes));
                }
                if bytes.is_empty() {
                    return Err(AppError::Validation("Uploaded file is empty".to_string()));
                }
                form.document = Some(UploadedDocument {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// POST /api/v1/resumes
/// Stores the document and the field map derived from it for later pre-fill.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestSummary>, AppError> {
    let form = read_form(multipart, state.config.max_upload_bytes).await?;
    let user_id = form
        .user_id
        .ok_or_else(|| AppError::Validation("'user_id' is required".to_string()))?;
    let survey_id = form
        .survey_id
        .ok_or_else(|| AppError::Validation("'survey_id' is required".to_string()))?;
    let document = form
        .document
        .ok_or_else(|| AppError::Validation("'file' is required".to_string()))?;

    let survey = state.survey.surveys.get_survey(survey_id).await?;
    let summary = ingest_resume(
        IngestParams {
            pool: &state.db,
            s3: &state.s3,
            s3_bucket: &state.config.s3_bucket,
            mapper: state.field_mapper.as_ref(),
        },
        &survey,
        user_id,
        document,
    )
    .await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("user_id", " 00000000-0000-0000-0000-000000000007 ").is_ok());
        let err = parse_uuid("user_id", "seven").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("user_id")));
    }
}
