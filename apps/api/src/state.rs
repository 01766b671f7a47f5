use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::prefill::ingest::FieldMapper;
use crate::survey::engine::Collaborators;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub config: Config,
    /// Everything a survey engine instance talks to. One engine is built per request.
    pub survey: Collaborators,
    /// Pluggable résumé field mapper. Default: LlmFieldMapper.
    pub field_mapper: Arc<dyn FieldMapper>,
}
