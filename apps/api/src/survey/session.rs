//! Resumable survey progress and its persistence surface.
//!
//! A `SurveySession` is overwritten as a whole on every state change. The
//! store is keyed by survey id only; it knows nothing about the engine.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::survey::model::ResponseMap;

pub const DEFAULT_KEY_PREFIX: &str = "survey_session_";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Submitted,
    Failed,
}

impl SubmissionStatus {
    /// Answers may not change while a write is in flight or after it landed.
    pub fn is_locked(self) -> bool {
        matches!(self, SubmissionStatus::Submitting | SubmissionStatus::Submitted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveySession {
    #[serde(default)]
    pub responses: ResponseMap,
    #[serde(default)]
    pub current_section: usize,
    #[serde(default)]
    pub current_question: usize,
    #[serde(default)]
    pub completed_sections: BTreeSet<usize>,
    #[serde(default = "default_show_intro")]
    pub show_intro: bool,
    #[serde(default)]
    pub submission_status: SubmissionStatus,
    /// Purchased code that first authorized a submission attempt on this session.
    #[serde(default)]
    pub authorized_access_code: Option<Uuid>,
}

fn default_show_intro() -> bool {
    true
}

impl Default for SurveySession {
    fn default() -> Self {
        Self {
            responses: ResponseMap::new(),
            current_section: 0,
            current_question: 0,
            completed_sections: BTreeSet::new(),
            show_intro: true,
            submission_status: SubmissionStatus::Idle,
            authorized_access_code: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage key for a survey's session.
pub fn session_key(prefix: &str, survey_id: Uuid) -> String {
    format!("{prefix}{survey_id}")
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, survey_id: Uuid) -> Result<Option<SurveySession>, SessionStoreError>;
    async fn save(&self, survey_id: Uuid, session: &SurveySession) -> Result<(), SessionStoreError>;
    async fn clear(&self, survey_id: Uuid) -> Result<(), SessionStoreError>;
}

/// Redis-backed store. Sessions are stored as JSON strings with no TTL;
/// abandoned sessions persist until cleared.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, survey_id: Uuid) -> Result<Option<SurveySession>, SessionStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(session_key(&self.prefix, survey_id)).await?;
        raw.map(|r| serde_json::from_str(&r).map_err(SessionStoreError::from))
            .transpose()
    }

    async fn save(&self, survey_id: Uuid, session: &SurveySession) -> Result<(), SessionStoreError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(session_key(&self.prefix, survey_id), payload)
            .await?;
        debug!("Saved session for survey {survey_id}");
        Ok(())
    }

    async fn clear(&self, survey_id: Uuid) -> Result<(), SessionStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(session_key(&self.prefix, survey_id)).await?;
        Ok(())
    }
}
