//! Report glue: turns a successful submission into a pending report record.
//! The report body itself is generated downstream by the agent pipeline.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::survey::collaborators::{AccessContext, SurveyError};
use crate::survey::model::ResponseMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportRequest {
    pub user_id: Uuid,
    pub survey_id: Uuid,
    pub answer_id: Uuid,
    pub access_context: AccessContext,
    pub responses: ResponseMap,
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn create_report(&self, request: &ReportRequest) -> Result<Uuid, SurveyError>;
}

pub struct PgReportSink {
    pool: PgPool,
}

impl PgReportSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSink for PgReportSink {
    async fn create_report(&self, request: &ReportRequest) -> Result<Uuid, SurveyError> {
        let responses = serde_json::to_value(&request.responses)
            .map_err(|e| SurveyError::Unavailable(format!("Unencodable responses: {e}")))?;

        let report_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO reports (user_id, survey_id, answer_id, access_code_id, responses, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
            "#,
        )
        .bind(request.user_id)
        .bind(request.survey_id)
        .bind(request.answer_id)
        .bind(request.access_context.record_id())
        .bind(responses)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Created pending report {report_id} for answers {}",
            request.answer_id
        );
        Ok(report_id)
    }
}
