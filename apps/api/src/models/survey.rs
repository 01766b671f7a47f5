use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyRow {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveySectionRow {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyQuestionRow {
    pub id: String,
    pub section_id: Uuid,
    pub question_type: String,
    pub label: String,
    pub required: bool,
    pub order_index: i32,
    /// Open per-type configuration blob (choices, bounds, ranking items).
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessCodeRow {
    pub id: Uuid,
    pub code: String,
    pub usage_count: i32,
    pub max_uses: i32,
}
