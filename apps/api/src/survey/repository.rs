//! Postgres-backed collaborators for the survey engine.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::survey::{AccessCodeRow, SurveyQuestionRow, SurveyRow, SurveySectionRow};
use crate::survey::collaborators::{
    AccessContext, AccessContexts, AnswerSink, SubmissionReceipt, SubmissionRequest, SurveyError,
    SurveySource,
};
use crate::survey::model::{Question, QuestionKind, Section, Survey};

pub struct PgSurveySource {
    pool: PgPool,
}

impl PgSurveySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SurveySource for PgSurveySource {
    async fn get_survey(&self, survey_id: Uuid) -> Result<Survey, SurveyError> {
        let survey: Option<SurveyRow> =
            sqlx::query_as("SELECT id, title, created_at FROM surveys WHERE id = $1")
                .bind(survey_id)
                .fetch_optional(&self.pool)
                .await?;
        let survey = survey.ok_or(SurveyError::NotFound(survey_id))?;

        let sections: Vec<SurveySectionRow> = sqlx::query_as(
            r#"
            SELECT id, survey_id, title, description, order_index
            FROM survey_sections
            WHERE survey_id = $1
            ORDER BY order_index
            "#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;

        let questions: Vec<SurveyQuestionRow> = sqlx::query_as(
            r#"
            SELECT q.id, q.section_id, q.question_type, q.label, q.required, q.order_index, q.config
            FROM survey_questions q
            JOIN survey_sections s ON s.id = q.section_id
            WHERE s.survey_id = $1
            ORDER BY q.order_index
            "#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Loaded survey {survey_id}: {} sections, {} questions",
            sections.len(),
            questions.len()
        );
        Ok(assemble_survey(survey, sections, questions))
    }
}

/// Builds the immutable survey tree, sorting sections and questions by their
/// explicit order. Questions whose section is missing are dropped.
pub fn assemble_survey(
    survey: SurveyRow,
    mut sections: Vec<SurveySectionRow>,
    questions: Vec<SurveyQuestionRow>,
) -> Survey {
    sections.sort_by_key(|s| s.order_index);

    let mut built: Vec<Section> = sections
        .into_iter()
        .map(|s| Section {
            id: s.id,
            title: s.title,
            description: s.description,
            order: s.order_index,
            questions: Vec::new(),
        })
        .collect();

    for q in questions {
        let Some(section) = built.iter_mut().find(|s| s.id == q.section_id) else {
            continue;
        };
        section.questions.push(Question {
            kind: QuestionKind::from_parts(&q.question_type, q.config.as_ref()),
            id: q.id,
            label: q.label,
            required: q.required,
            order: q.order_index,
        });
    }
    for section in &mut built {
        section.questions.sort_by_key(|q| q.order);
    }

    Survey {
        id: survey.id,
        title: survey.title,
        sections: built,
    }
}

pub struct PgAnswerSink {
    pool: PgPool,
}

impl PgAnswerSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnswerSink for PgAnswerSink {
    async fn submit_answers(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SurveyError> {
        let payload = serde_json::to_value(&request.payload)
            .map_err(|e| SurveyError::Unavailable(format!("Unencodable answers: {e}")))?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO answers (survey_id, user_id, access_code_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request.survey_id)
        .bind(request.user_id)
        .bind(request.access_context_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Inserted answers {id} for survey {} ({} responses)",
            request.survey_id,
            request.payload.len()
        );
        Ok(SubmissionReceipt { id })
    }
}

pub struct PgAccessCodes {
    pool: PgPool,
}

impl PgAccessCodes {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessContexts for PgAccessCodes {
    async fn find_purchased(&self, id: Uuid) -> Result<Option<AccessContext>, SurveyError> {
        let row: Option<AccessCodeRow> = sqlx::query_as(
            r#"
            SELECT id, code, usage_count, max_uses
            FROM access_codes
            WHERE id = $1 AND usage_count < max_uses
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AccessContext::Purchased {
            id: r.id,
            code: r.code,
        }))
    }

    async fn increment_usage(&self, id: Uuid) -> Result<(), SurveyError> {
        sqlx::query("UPDATE access_codes SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
