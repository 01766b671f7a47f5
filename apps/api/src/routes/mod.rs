pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::prefill::handlers as prefill;
use crate::state::AppState;
use crate::survey::handlers as survey;

/// Headroom over the file limit for the other multipart fields and boundaries.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Survey taking
        .route("/api/v1/surveys/:id", get(survey::handle_get_survey))
        .route(
            "/api/v1/surveys/:id/session",
            post(survey::handle_open_session).delete(survey::handle_finish),
        )
        .route(
            "/api/v1/surveys/:id/session/events",
            post(survey::handle_session_event),
        )
        .route(
            "/api/v1/surveys/:id/session/submit",
            post(survey::handle_submit),
        )
        // Résumé pre-fill
        .route(
            "/api/v1/resumes",
            post(prefill::handle_upload_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use aws_sdk_s3::config::{BehaviorVersion, Region};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Map, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::prefill::ingest::FieldMapper;
    use crate::prefill::PrefillError;
    use crate::survey::model::Survey;
    use crate::survey::testing::*;

    struct NoMapper;

    #[async_trait]
    impl FieldMapper for NoMapper {
        async fn map_fields(
            &self,
            _survey: &Survey,
            _document_text: &str,
        ) -> Result<Map<String, Value>, PrefillError> {
            Ok(Map::new())
        }
    }

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/assessment_test".into(),
            redis_url: "redis://localhost".into(),
            s3_bucket: "resumes".into(),
            s3_endpoint: "http://localhost:9000".into(),
            aws_access_key_id: "test".into(),
            aws_secret_access_key: "test".into(),
            anthropic_api_key: "test".into(),
            port: 8080,
            rust_log: "info".into(),
            session_key_prefix: "survey_session_".into(),
            max_upload_bytes: 1024,
        }
    }

    fn app(h: &Harness) -> Router {
        let config = test_config();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .build(),
        );
        build_router(AppState {
            db,
            s3,
            config,
            survey: h.deps.clone(),
            field_mapper: Arc::new(NoMapper),
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Answers the two-section survey over HTTP, ranking B, A, C.
    async fn answer_everything(app: &Router, base: &str) {
        let events = format!("{base}/events");
        let steps = [
            json!({ "type": "start_section" }),
            json!({ "type": "interact", "question_id": "q1",
                    "interaction": { "action": "select", "choice": "Y" } }),
            json!({ "type": "next" }),
            json!({ "type": "start_section" }),
            json!({ "type": "interact", "question_id": "q2",
                    "interaction": { "action": "move", "from": 1, "to": 0 } }),
        ];
        for event in steps {
            let (status, body) = call(
                app,
                Method::POST,
                &events,
                Some(json!({ "user_id": user().user_id, "event": event })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["accepted"], true, "{event}");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new(two_section_survey());
        let (status, body) = call(&app(&h), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "assessment-api");
    }

    #[tokio::test]
    async fn test_unknown_survey_is_404() {
        let h = Harness::build(None, None, false);
        let app = app(&h);
        let uri = format!("/api/v1/surveys/{}", h.survey_id);
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = call(&app, Method::POST, &format!("{uri}/session"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!h.sessions.contains(h.survey_id));
    }

    #[tokio::test]
    async fn test_survey_flow_over_http() {
        let h = Harness::new(two_section_survey());
        h.access
            .codes
            .lock()
            .unwrap()
            .insert(uuid::Uuid::from_u128(42), purchased());
        let app = app(&h);
        let base = format!("/api/v1/surveys/{}/session", h.survey_id);
        let user = user().user_id;

        let (status, view) = call(&app, Method::POST, &base, Some(json!({ "user_id": user }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["phase"], "section_intro");

        answer_everything(&app, &base).await;

        // Finishing before submission is refused.
        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("{base}/submit"),
            Some(json!({ "user_id": user, "access_code_id": uuid::Uuid::from_u128(42) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "submitted");
        assert_eq!(body["view"]["phase"], "submitted");
        assert_eq!(
            serde_json::to_value(&h.answers.calls.lock().unwrap()[0].payload).unwrap(),
            json!({ "q1": "Y", "q2": ["B", "A", "C"] })
        );

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!h.sessions.contains(h.survey_id));
    }

    #[tokio::test]
    async fn test_submit_without_code_or_stored_session_is_rejected() {
        let h = Harness::new(two_section_survey());
        let app = app(&h);
        let base = format!("/api/v1/surveys/{}/session", h.survey_id);

        // No stored session and no code: nothing to authorize the attempt.
        let (_, body) = call(
            &app,
            Method::POST,
            &format!("{base}/submit"),
            Some(json!({ "user_id": user().user_id })),
        )
        .await;
        assert_eq!(body["outcome"], "rejected");
        assert_eq!(h.answers.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stored_session_needs_a_prior_purchased_code() {
        let h = Harness::new(two_section_survey());
        h.access
            .codes
            .lock()
            .unwrap()
            .insert(uuid::Uuid::from_u128(42), purchased());
        let app = app(&h);
        let base = format!("/api/v1/surveys/{}/session", h.survey_id);
        let user = user().user_id;

        let (status, _) = call(&app, Method::POST, &base, Some(json!({ "user_id": user }))).await;
        assert_eq!(status, StatusCode::OK);
        answer_everything(&app, &base).await;

        // A stored session alone does not authorize a submission.
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("{base}/submit"),
            Some(json!({ "user_id": user })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "rejected");
        assert_eq!(body["reason"], "missing_access_context");
        assert_eq!(h.answers.call_count(), 0);

        let (status, _) = call(
            &app,
            Method::POST,
            &base,
            Some(json!({ "user_id": user, "access_code_id": uuid::Uuid::from_u128(99) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, view) = call(
            &app,
            Method::POST,
            &base,
            Some(json!({ "user_id": user, "access_code_id": uuid::Uuid::from_u128(42) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            view["session"]["authorized_access_code"],
            json!(uuid::Uuid::from_u128(42))
        );

        // Continuing the authorized session uses the placeholder.
        let (_, body) = call(
            &app,
            Method::POST,
            &format!("{base}/submit"),
            Some(json!({ "user_id": user })),
        )
        .await;
        assert_eq!(body["outcome"], "submitted");
        let calls = h.answers.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].access_context_id, None);
        assert!(h.access.increments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_multipart_fields() {
        let h = Harness::new(two_section_survey());
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{}\r\n--{boundary}--\r\n",
            user().user_id
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/resumes")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
