mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod prefill;
mod report;
mod routes;
mod state;
mod survey;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::prefill::ingest::LlmFieldMapper;
use crate::prefill::{PgResumeStore, PrefillResolver};
use crate::report::PgReportSink;
use crate::routes::build_router;
use crate::state::AppState;
use crate::survey::engine::Collaborators;
use crate::survey::repository::{PgAccessCodes, PgAnswerSink, PgSurveySource};
use crate::survey::session::RedisSessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting assessment API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (survey sessions)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let sessions = RedisSessionStore::new(redis, config.session_key_prefix.clone());
    info!(
        "Redis session store initialized (key prefix: {})",
        config.session_key_prefix
    );

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client for résumé field mapping
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let survey = Collaborators {
        surveys: Arc::new(PgSurveySource::new(db.clone())),
        sessions: Arc::new(sessions),
        answers: Arc::new(PgAnswerSink::new(db.clone())),
        access: Arc::new(PgAccessCodes::new(db.clone())),
        reports: Arc::new(PgReportSink::new(db.clone())),
        prefill: PrefillResolver::new(Arc::new(PgResumeStore::new(db.clone()))),
    };

    // Build app state
    let state = AppState {
        db,
        s3,
        config: config.clone(),
        survey,
        field_mapper: Arc::new(LlmFieldMapper(llm)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the web client's origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "assessment-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
