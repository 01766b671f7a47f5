//! Axum route handlers for survey taking.
//!
//! Every request reconstructs one engine instance from the session store,
//! applies a single operation, and answers with the resulting session view.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::survey::collaborators::{AccessContext, Identity};
use crate::survey::control::{control_for, ControlKind, Interaction};
use crate::survey::engine::{
    EngineState, KeyAction, KeyPress, Notice, Phase, Progress, SubmitOutcome, SurveyEngine,
};
use crate::survey::filter::visible_questions;
use crate::survey::model::{AnswerValue, Question, Survey};
use crate::survey::session::{SubmissionStatus, SurveySession};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub control: ControlKind,
}

impl QuestionView {
    fn of(question: &Question) -> Self {
        Self {
            control: control_for(question),
            question: question.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SectionView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuestionView>,
}

/// Survey definition as the taker sees it: hidden questions are left out.
#[derive(Debug, Serialize)]
pub struct SurveyView {
    pub id: Uuid,
    pub title: String,
    pub sections: Vec<SectionView>,
}

impl From<&Survey> for SurveyView {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id,
            title: survey.title.clone(),
            sections: survey
                .sections
                .iter()
                .map(|s| SectionView {
                    id: s.id,
                    title: s.title.clone(),
                    description: s.description.clone(),
                    questions: visible_questions(s).into_iter().map(QuestionView::of).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentQuestion {
    #[serde(flatten)]
    pub view: QuestionView,
    pub value: Option<AnswerValue>,
    pub complete: bool,
}

#[derive(Debug, Serialize)]
pub struct SectionSummary {
    pub index: usize,
    pub title: String,
    pub description: Option<String>,
}

/// JSON projection of the engine state.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub survey_id: Uuid,
    pub phase: Phase,
    pub session: SurveySession,
    pub section: Option<SectionSummary>,
    pub question: Option<CurrentQuestion>,
    pub progress: Progress,
    pub can_go_next: bool,
    pub can_submit: bool,
    pub notice: Option<Notice>,
}

impl SessionView {
    pub fn from_state(survey_id: Uuid, state: &EngineState) -> Self {
        let section = state
            .current_section()
            .map(|s| SectionSummary {
                index: state.session.current_section,
                title: s.title.clone(),
                description: s.description.clone(),
            });
        let question = state.current_question().map(|q| CurrentQuestion {
            view: QuestionView::of(q),
            value: state.session.responses.get(&q.id).cloned(),
            complete: state.is_current_question_complete(),
        });
        let answering = matches!(state.phase(), Phase::Answering | Phase::Failed)
            && !state.session.show_intro;
        let complete = state.is_current_question_complete();

        Self {
            survey_id,
            phase: state.phase(),
            session: state.session.clone(),
            section,
            question,
            progress: state.progress(),
            can_go_next: answering && complete && !state.is_final_question(),
            can_submit: answering && complete && state.is_final_question(),
            notice: state.notice.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    pub user_id: Option<Uuid>,
    /// A purchased code presented up front authorizes the session.
    pub access_code_id: Option<Uuid>,
}

/// One user event against the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The only way past a section's intro screen. `next` and Enter are
    /// ignored while the intro shows.
    StartSection,
    Interact {
        question_id: String,
        interaction: Interaction,
    },
    Next,
    Back,
    Jump {
        section: usize,
    },
    Key {
        key: KeyPress,
    },
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: Option<Uuid>,
    /// Only consulted when a key press submits on the final question.
    pub access_code_id: Option<Uuid>,
    pub event: ClientEvent,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// Whether the event changed anything.
    pub accepted: bool,
    pub key_action: Option<KeyAction>,
    pub view: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Option<Uuid>,
    pub access_code_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub outcome: SubmitOutcome,
    pub view: SessionView,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn identity_of(user_id: Option<Uuid>) -> Option<Identity> {
    user_id.map(|user_id| Identity { user_id })
}

/// Builds and initializes the engine for one request. A survey that cannot be
/// loaded is reported as missing.
async fn open_engine(
    state: &AppState,
    survey_id: Uuid,
    identity: Option<Identity>,
) -> Result<SurveyEngine, AppError> {
    let mut engine = SurveyEngine::new(survey_id, state.survey.clone());
    engine.initialize(identity).await;
    if let Some(message) = &engine.state().load_error {
        return Err(AppError::NotFound(message.clone()));
    }
    Ok(engine)
}

/// A valid purchased code, or the placeholder when continuing a session that
/// a purchased code authorized earlier.
async fn resolve_access(
    state: &AppState,
    engine: &SurveyEngine,
    access_code_id: Option<Uuid>,
) -> Result<Option<AccessContext>, AppError> {
    match access_code_id {
        Some(id) => Ok(state.survey.access.find_purchased(id).await?),
        None if engine.is_authorized() => Ok(Some(AccessContext::ExistingSession)),
        None => Ok(None),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/surveys/:id
pub async fn handle_get_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
) -> Result<Json<SurveyView>, AppError> {
    let survey = state.survey.surveys.get_survey(survey_id).await?;
    Ok(Json(SurveyView::from(&survey)))
}

/// POST /api/v1/surveys/:id/session
pub async fn handle_open_session(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    body: Option<Json<SessionRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let access = match req.access_code_id {
        Some(id) => Some(
            state
                .survey
                .access
                .find_purchased(id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Access code {id} is not usable")))?,
        ),
        None => None,
    };

    let mut engine = open_engine(&state, survey_id, identity_of(req.user_id)).await?;
    if let Some(access) = &access {
        engine.authorize(access).await;
    }
    Ok(Json(SessionView::from_state(survey_id, engine.state())))
}

/// POST /api/v1/surveys/:id/session/events
pub async fn handle_session_event(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Json(req): Json<EventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    let identity = identity_of(req.user_id);
    let mut engine = open_engine(&state, survey_id, identity).await?;

    let mut key_action = None;
    let accepted = match req.event {
        ClientEvent::StartSection => {
            let was_intro = engine.state().session.show_intro;
            engine.start_section().await;
            was_intro
        }
        ClientEvent::Interact {
            question_id,
            interaction,
        } => engine.interact(&question_id, interaction).await,
        ClientEvent::Next => engine.next().await,
        ClientEvent::Back => engine.back().await,
        ClientEvent::Jump { section } => engine.jump_to_section(section).await,
        ClientEvent::Key { key } => {
            let access = if key.is_submit_shortcut() && engine.state().is_final_question() {
                resolve_access(&state, &engine, req.access_code_id).await?
            } else {
                None
            };
            key_action = engine.handle_key(&key, access.as_ref(), identity).await;
            key_action.is_some()
        }
    };

    Ok(Json(EventResponse {
        accepted,
        key_action,
        view: SessionView::from_state(survey_id, engine.state()),
    }))
}

/// POST /api/v1/surveys/:id/session/submit
/// Also the retry path after a failed submission.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let identity = identity_of(req.user_id);
    let mut engine = open_engine(&state, survey_id, identity).await?;
    let access = resolve_access(&state, &engine, req.access_code_id).await?;

    let outcome = engine.submit(access.as_ref(), identity).await;
    if let SubmitOutcome::Submitted { answer_id, .. } = outcome {
        info!("Survey {survey_id} submitted as answers {answer_id}");
    }

    Ok(Json(SubmitResponse {
        outcome,
        view: SessionView::from_state(survey_id, engine.state()),
    }))
}

/// DELETE /api/v1/surveys/:id/session
/// The explicit "continue" after a successful submission.
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut engine = open_engine(&state, survey_id, None).await?;
    if engine.state().session.submission_status != SubmissionStatus::Submitted {
        return Err(AppError::Conflict(
            "Only a submitted session can be finished".to_string(),
        ));
    }
    if !engine.finish().await {
        return Err(AppError::Conflict(
            "The session could not be cleared, try again".to_string(),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}
