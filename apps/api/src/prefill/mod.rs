//! Résumé pre-fill: turns a user's stored résumé data into candidate survey answers.
//!
//! Two stored shapes are supported:
//! - `Structured`: a field map keyed by question id, produced by the AI mapping pass
//! - `RawText`: extracted document text, mined with regex heuristics (lower fidelity)
//!
//! Every candidate is validated against the question it targets before it is
//! accepted. The engine merges the result only into an empty response map.

pub mod extract;
pub mod handlers;
pub mod heuristics;
pub mod ingest;
pub mod mapping;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::llm_client::LlmError;
use crate::survey::collaborators::Identity;
use crate::survey::model::{ResponseMap, Survey};

#[derive(Debug, Error)]
pub enum PrefillError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Résumé-derived data stored for a user.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeData {
    Structured(Map<String, Value>),
    RawText(String),
}

#[async_trait]
pub trait ResumeDataSource: Send + Sync {
    async fn get_stored_resume_data(&self, user_id: Uuid)
        -> Result<Option<ResumeData>, PrefillError>;
}

#[derive(Clone)]
pub struct PrefillResolver {
    source: Arc<dyn ResumeDataSource>,
}

impl PrefillResolver {
    pub fn new(source: Arc<dyn ResumeDataSource>) -> Self {
        Self { source }
    }

    /// Best-effort candidate answers for `survey`. An empty map means nothing usable.
    pub async fn resolve(
        &self,
        identity: Identity,
        survey: &Survey,
    ) -> Result<ResponseMap, PrefillError> {
        let resolved = match self.source.get_stored_resume_data(identity.user_id).await? {
            None => ResponseMap::new(),
            Some(ResumeData::Structured(fields)) => mapping::map_structured_fields(survey, &fields),
            Some(ResumeData::RawText(text)) => heuristics::extract_from_text(survey, &text),
        };
        debug!(
            "Pre-fill resolved {} answers for user {}",
            resolved.len(),
            identity.user_id
        );
        Ok(resolved)
    }
}

/// Latest stored résumé per user, from `resume_documents`.
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeDataSource for PgResumeStore {
    async fn get_stored_resume_data(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ResumeData>, PrefillError> {
        let row: Option<(Option<Value>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT structured_fields, raw_text
            FROM resume_documents
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(structured, raw_text)| match structured {
            Some(Value::Object(fields)) => Some(ResumeData::Structured(fields)),
            _ => raw_text
                .filter(|t| !t.trim().is_empty())
                .map(ResumeData::RawText),
        }))
    }
}
