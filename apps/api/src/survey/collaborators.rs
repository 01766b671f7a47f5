//! Contracts with the systems around the survey engine.
//!
//! The engine only ever talks to these traits. Postgres implementations live
//! in `survey::repository`; tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::survey::model::{ResponseMap, Survey};

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Survey {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// The authenticated user taking the survey.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

/// What authorizes this survey attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessContext {
    /// A validated, purchased access code.
    Purchased { id: Uuid, code: String },
    /// Placeholder used to continue a stored session without re-entering a code.
    /// Carries no usage counter.
    ExistingSession,
}

impl AccessContext {
    /// Id recorded alongside submitted answers; `None` for the placeholder.
    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            AccessContext::Purchased { id, .. } => Some(*id),
            AccessContext::ExistingSession => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionRequest {
    pub survey_id: Uuid,
    pub user_id: Uuid,
    pub access_context_id: Option<Uuid>,
    pub payload: ResponseMap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub id: Uuid,
}

#[async_trait]
pub trait SurveySource: Send + Sync {
    async fn get_survey(&self, survey_id: Uuid) -> Result<Survey, SurveyError>;
}

#[async_trait]
pub trait AnswerSink: Send + Sync {
    async fn submit_answers(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SurveyError>;
}

#[async_trait]
pub trait AccessContexts: Send + Sync {
    /// Looks up a purchased code that still has uses left.
    async fn find_purchased(&self, id: Uuid) -> Result<Option<AccessContext>, SurveyError>;
    async fn increment_usage(&self, id: Uuid) -> Result<(), SurveyError>;
}
