//! The survey-taking state machine.
//!
//! `reduce` is a pure `(state, event) -> state` function. `SurveyEngine` is the
//! single effect runner around it: it owns the three async boundaries (survey
//! fetch, pre-fill lookup, answer submission) and persists the session after
//! every transition once initialization has completed.
//!
//! Lifecycle:
//! `loading_survey → loading_session → section_intro ⇄ answering →
//!  submitting → submitted | failed` (failed may retry), or `load_error`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::prefill::PrefillResolver;
use crate::report::{ReportRequest, ReportSink};
use crate::survey::collaborators::{
    AccessContext, AccessContexts, AnswerSink, Identity, SubmissionRequest, SurveySource,
};
use crate::survey::completion::is_question_complete;
use crate::survey::control::{self, Interaction};
use crate::survey::filter::{visible_count, visible_questions};
use crate::survey::model::{AnswerValue, Question, ResponseMap, Section, Survey};
use crate::survey::session::{SessionStore, SubmissionStatus, SurveySession};

pub const SUBMIT_FAILED_NOTICE: &str =
    "We couldn't submit your answers. They are saved on this device; please try again.";
pub const SUBMITTED_NOTICE: &str = "Your answers have been received.";
pub const REPORT_DEFERRED_NOTICE: &str =
    "Your answers were received, but your report may take a little longer to appear.";
const LOAD_FAILED_NOTICE: &str = "This survey could not be loaded.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LoadingSurvey,
    LoadingSession,
    LoadError,
    SectionIntro,
    Answering,
    Submitting,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub survey: Option<Arc<Survey>>,
    pub session: SurveySession,
    /// Set once a session has been restored or created; nothing is persisted before.
    pub initialized: bool,
    pub load_error: Option<String>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone)]
pub enum Event {
    SurveyLoaded(Arc<Survey>),
    SurveyLoadFailed(String),
    SessionRestored(Option<SurveySession>),
    PrefillResolved(ResponseMap),
    AccessAuthorized(Uuid),
    StartSection,
    Answer {
        question_id: String,
        value: AnswerValue,
    },
    Next,
    Back,
    JumpToSection(usize),
    SubmitStarted,
    SubmitFailed,
    SubmitSucceeded,
    ReportDeferred,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Progress {
    pub section_index: usize,
    pub section_count: usize,
    pub question_index: usize,
    pub question_count: usize,
    pub section_percent: u8,
    pub overall_percent: u8,
}

impl EngineState {
    pub fn phase(&self) -> Phase {
        if self.load_error.is_some() {
            return Phase::LoadError;
        }
        if self.survey.is_none() {
            return Phase::LoadingSurvey;
        }
        if !self.initialized {
            return Phase::LoadingSession;
        }
        match self.session.submission_status {
            SubmissionStatus::Submitting => Phase::Submitting,
            SubmissionStatus::Submitted => Phase::Submitted,
            SubmissionStatus::Failed => Phase::Failed,
            SubmissionStatus::Idle if self.session.show_intro => Phase::SectionIntro,
            SubmissionStatus::Idle => Phase::Answering,
        }
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.survey
            .as_deref()?
            .sections
            .get(self.session.current_section)
    }

    pub fn current_question(&self) -> Option<&Question> {
        let section = self.current_section()?;
        visible_questions(section)
            .get(self.session.current_question)
            .copied()
    }

    /// The navigation gate. A section with nothing visible has nothing to answer.
    pub fn is_current_question_complete(&self) -> bool {
        match self.current_question() {
            Some(q) => is_question_complete(q, self.session.responses.get(&q.id)),
            None => self.current_section().is_some(),
        }
    }

    pub fn is_last_question_in_section(&self) -> bool {
        self.current_section()
            .map(|s| self.session.current_question + 1 >= visible_count(s))
            .unwrap_or(false)
    }

    pub fn is_final_question(&self) -> bool {
        let section_count = self.survey.as_ref().map_or(0, |s| s.sections.len());
        section_count > 0
            && self.session.current_section + 1 == section_count
            && self.is_last_question_in_section()
    }

    pub fn can_jump_to(&self, target: usize) -> bool {
        let section_count = self.survey.as_ref().map_or(0, |s| s.sections.len());
        target < section_count
            && (target <= self.session.current_section
                || self.session.completed_sections.contains(&target))
    }

    pub fn progress(&self) -> Progress {
        let sections: &[Section] = self
            .survey
            .as_deref()
            .map(|s| s.sections.as_slice())
            .unwrap_or(&[]);
        let section_index = self.session.current_section;
        let question_index = self.session.current_question;
        let question_count = sections.get(section_index).map_or(0, visible_count);

        let total: usize = sections.iter().map(visible_count).sum();
        let before: usize = sections.iter().take(section_index).map(visible_count).sum();
        let reached = if question_count == 0 {
            before
        } else {
            before + question_index + 1
        };

        Progress {
            section_index,
            section_count: sections.len(),
            question_index,
            question_count,
            section_percent: percent(question_index + 1, question_count),
            overall_percent: percent(reached, total),
        }
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 100;
    }
    ((part.min(whole) * 100) / whole) as u8
}

/// Applies one event. Events that are not valid in the current state leave it unchanged.
pub fn reduce(mut state: EngineState, event: Event) -> EngineState {
    match event {
        Event::SurveyLoaded(survey) => {
            state.survey = Some(survey);
            state.load_error = None;
        }
        Event::SurveyLoadFailed(message) => {
            state.load_error = Some(message);
            state.notice = Some(Notice::Error(LOAD_FAILED_NOTICE.to_string()));
        }
        Event::SessionRestored(restored) => {
            let Some(survey) = state.survey.clone() else {
                return state;
            };
            let mut session = restored.unwrap_or_default();
            clamp_position(&mut session, &survey);
            // Each instance runs its own write, so a stored `submitting` was abandoned.
            if session.submission_status == SubmissionStatus::Submitting {
                session.submission_status = SubmissionStatus::Failed;
                state.notice = Some(Notice::Error(SUBMIT_FAILED_NOTICE.to_string()));
            }
            state.session = session;
            state.initialized = true;
        }
        Event::PrefillResolved(responses) => {
            if state.initialized
                && state.session.responses.is_empty()
                && !state.session.submission_status.is_locked()
            {
                state.session.responses = responses;
            }
        }
        _ if !state.initialized => {}
        Event::AccessAuthorized(code) => {
            if state.session.authorized_access_code.is_none() {
                state.session.authorized_access_code = Some(code);
            }
        }
        Event::StartSection => state.session.show_intro = false,
        Event::Answer { question_id, value } => {
            if !state.session.submission_status.is_locked() {
                state.session.responses.insert(question_id, value);
            }
        }
        // The intro is only dismissed by `StartSection`.
        Event::Next => {
            if !state.session.show_intro && state.is_current_question_complete() {
                advance(&mut state);
            }
        }
        Event::Back => retreat(&mut state),
        Event::JumpToSection(target) => {
            if state.can_jump_to(target) {
                state.session.current_section = target;
                state.session.current_question = 0;
                state.session.show_intro = true;
            }
        }
        Event::SubmitStarted => {
            state.session.submission_status = SubmissionStatus::Submitting;
            state.notice = None;
        }
        Event::SubmitFailed => {
            state.session.submission_status = SubmissionStatus::Failed;
            state.notice = Some(Notice::Error(SUBMIT_FAILED_NOTICE.to_string()));
        }
        Event::SubmitSucceeded => {
            state.session.submission_status = SubmissionStatus::Submitted;
            state.notice = Some(Notice::Info(SUBMITTED_NOTICE.to_string()));
        }
        Event::ReportDeferred => {
            state.notice = Some(Notice::Warning(REPORT_DEFERRED_NOTICE.to_string()));
        }
    }
    state
}

fn advance(state: &mut EngineState) {
    let Some(survey) = state.survey.clone() else {
        return;
    };
    let session = &mut state.session;
    let count = survey
        .sections
        .get(session.current_section)
        .map_or(0, visible_count);

    if session.current_question + 1 < count {
        session.current_question += 1;
        return;
    }

    session.completed_sections.insert(session.current_section);
    if session.current_section + 1 < survey.sections.len() {
        session.current_section += 1;
        session.current_question = 0;
        session.show_intro = true;
    }
}

fn retreat(state: &mut EngineState) {
    let Some(survey) = state.survey.clone() else {
        return;
    };
    let session = &mut state.session;
    if session.current_question > 0 {
        session.current_question -= 1;
        session.show_intro = false;
    } else if session.current_section > 0 {
        session.current_section -= 1;
        session.current_question = visible_count(&survey.sections[session.current_section])
            .saturating_sub(1);
        session.show_intro = false;
    }
}

/// Keeps a restored position inside the survey if its shape changed since.
fn clamp_position(session: &mut SurveySession, survey: &Survey) {
    let section_count = survey.sections.len();
    if section_count == 0 {
        session.current_section = 0;
        session.current_question = 0;
        return;
    }
    if session.current_section >= section_count {
        session.current_section = section_count - 1;
    }
    let count = visible_count(&survey.sections[session.current_section]);
    if session.current_question >= count {
        session.current_question = count.saturating_sub(1);
    }
    session.completed_sections.retain(|i| *i < section_count);
}

/// Where keyboard focus sits when a key is pressed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusTarget {
    #[default]
    Page,
    TextInput,
    TextArea,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub focus: FocusTarget,
}

impl KeyPress {
    /// Plain Enter outside a multi-line text area.
    pub fn is_submit_shortcut(&self) -> bool {
        self.key == "Enter"
            && !self.shift
            && !self.ctrl
            && !self.alt
            && self.focus != FocusTarget::TextArea
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Next,
    Submit,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitRejection {
    SurveyNotLoaded,
    MissingAccessContext,
    MissingIdentity,
    InFlight,
    AlreadySubmitted,
    NotAtEnd,
    Incomplete,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Rejected { reason: SubmitRejection },
    Failed,
    Submitted { answer_id: Uuid, report_created: bool },
}

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub surveys: Arc<dyn SurveySource>,
    pub sessions: Arc<dyn SessionStore>,
    pub answers: Arc<dyn AnswerSink>,
    pub access: Arc<dyn AccessContexts>,
    pub reports: Arc<dyn ReportSink>,
    pub prefill: PrefillResolver,
}

/// One engine instance drives one survey session.
pub struct SurveyEngine {
    survey_id: Uuid,
    deps: Collaborators,
    state: EngineState,
    prefill_attempted: bool,
}

impl SurveyEngine {
    pub fn new(survey_id: Uuid, deps: Collaborators) -> Self {
        Self {
            survey_id,
            deps,
            state: EngineState::default(),
            prefill_attempted: false,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Runs a transition, then persists the session if initialization has completed.
    async fn dispatch(&mut self, event: Event) {
        debug!("Survey {}: {:?}", self.survey_id, event);
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
        if self.state.initialized {
            if let Err(e) = self
                .deps
                .sessions
                .save(self.survey_id, &self.state.session)
                .await
            {
                warn!("Failed to persist session for survey {}: {e}", self.survey_id);
            }
        }
    }

    /// Loads the survey, restores or creates the session, and pre-fills a fresh one.
    pub async fn initialize(&mut self, identity: Option<Identity>) {
        match self.deps.surveys.get_survey(self.survey_id).await {
            Ok(survey) => self.dispatch(Event::SurveyLoaded(Arc::new(survey))).await,
            Err(e) => {
                warn!("Failed to load survey {}: {e}", self.survey_id);
                self.dispatch(Event::SurveyLoadFailed(e.to_string())).await;
                return;
            }
        }

        let restored = match self.deps.sessions.load(self.survey_id).await {
            Ok(restored) => restored,
            Err(e) => {
                warn!(
                    "Could not restore session for survey {}, starting fresh: {e}",
                    self.survey_id
                );
                None
            }
        };
        let fresh = restored.is_none();
        self.dispatch(Event::SessionRestored(restored)).await;

        if fresh {
            if let Some(identity) = identity {
                self.prefill(identity).await;
            }
        }
    }

    async fn prefill(&mut self, identity: Identity) {
        if self.prefill_attempted || !self.state.session.responses.is_empty() {
            return;
        }
        self.prefill_attempted = true;

        let Some(survey) = self.state.survey.clone() else {
            return;
        };
        match self.deps.prefill.resolve(identity, &survey).await {
            Ok(responses) if !responses.is_empty() => {
                info!(
                    "Pre-filled {} answers for survey {}",
                    responses.len(),
                    self.survey_id
                );
                self.dispatch(Event::PrefillResolved(responses)).await;
            }
            Ok(_) => {}
            Err(e) => warn!("Pre-fill skipped for survey {}: {e}", self.survey_id),
        }
    }

    /// Records a purchased code as the session's authorization. The first code
    /// recorded is kept. Returns whether the session is now authorized.
    pub async fn authorize(&mut self, access: &AccessContext) -> bool {
        let AccessContext::Purchased { id, .. } = access else {
            return self.state.session.authorized_access_code.is_some();
        };
        if !self.state.initialized {
            return false;
        }
        if self.state.session.authorized_access_code.is_none() {
            self.dispatch(Event::AccessAuthorized(*id)).await;
        }
        true
    }

    /// Whether a purchased code has authorized this session before.
    pub fn is_authorized(&self) -> bool {
        self.state.session.authorized_access_code.is_some()
    }

    pub async fn start_section(&mut self) {
        self.dispatch(Event::StartSection).await;
    }

    /// Routes a control interaction through the question's control. Returns
    /// whether an answer was recorded.
    pub async fn interact(&mut self, question_id: &str, interaction: Interaction) -> bool {
        if self.state.session.submission_status.is_locked() {
            return false;
        }
        let Some(survey) = self.state.survey.clone() else {
            return false;
        };
        let Some(question) = survey
            .sections
            .iter()
            .flat_map(visible_questions)
            .find(|q| q.id == question_id)
        else {
            return false;
        };

        let current = self.state.session.responses.get(question_id);
        match control::apply(question, current, interaction) {
            Some(value) => {
                self.dispatch(Event::Answer {
                    question_id: question_id.to_string(),
                    value,
                })
                .await;
                true
            }
            None => false,
        }
    }

    /// Returns whether the position changed.
    pub async fn next(&mut self) -> bool {
        let before = self.position();
        self.dispatch(Event::Next).await;
        self.position() != before
    }

    pub async fn back(&mut self) -> bool {
        let before = self.position();
        self.dispatch(Event::Back).await;
        self.position() != before
    }

    pub async fn jump_to_section(&mut self, target: usize) -> bool {
        if !self.state.can_jump_to(target) {
            return false;
        }
        self.dispatch(Event::JumpToSection(target)).await;
        true
    }

    fn position(&self) -> (usize, usize, bool, usize) {
        let s = &self.state.session;
        (
            s.current_section,
            s.current_question,
            s.show_intro,
            s.completed_sections.len(),
        )
    }

    /// Enter advances, or submits on the final question, only when the
    /// current question is complete. Ignored on a section intro.
    pub async fn handle_key(
        &mut self,
        key: &KeyPress,
        access: Option<&AccessContext>,
        identity: Option<Identity>,
    ) -> Option<KeyAction> {
        if !key.is_submit_shortcut()
            || !matches!(self.state.phase(), Phase::Answering | Phase::Failed)
            || self.state.session.show_intro
            || !self.state.is_current_question_complete()
        {
            return None;
        }

        if self.state.is_final_question() {
            self.submit(access, identity).await;
            Some(KeyAction::Submit)
        } else {
            self.next().await;
            Some(KeyAction::Next)
        }
    }

    fn check_submittable(
        &self,
        access: Option<&AccessContext>,
        identity: Option<Identity>,
    ) -> Result<(AccessContext, Identity), SubmitRejection> {
        if self.state.survey.is_none() || !self.state.initialized {
            return Err(SubmitRejection::SurveyNotLoaded);
        }
        let access = access.ok_or(SubmitRejection::MissingAccessContext)?;
        let identity = identity.ok_or(SubmitRejection::MissingIdentity)?;
        match self.state.session.submission_status {
            SubmissionStatus::Submitting => return Err(SubmitRejection::InFlight),
            SubmissionStatus::Submitted => return Err(SubmitRejection::AlreadySubmitted),
            SubmissionStatus::Idle | SubmissionStatus::Failed => {}
        }
        if !self.state.is_final_question() {
            return Err(SubmitRejection::NotAtEnd);
        }
        if !self.state.is_current_question_complete() {
            return Err(SubmitRejection::Incomplete);
        }
        Ok((access.clone(), identity))
    }

    /// Submits the response map once. Also the retry path after a failure;
    /// retries are only ever triggered by the user.
    pub async fn submit(
        &mut self,
        access: Option<&AccessContext>,
        identity: Option<Identity>,
    ) -> SubmitOutcome {
        let (access, identity) = match self.check_submittable(access, identity) {
            Ok(ok) => ok,
            Err(reason) => {
                debug!("Submission of survey {} refused: {reason:?}", self.survey_id);
                return SubmitOutcome::Rejected { reason };
            }
        };

        self.authorize(&access).await;
        self.dispatch(Event::SubmitStarted).await;

        let request = SubmissionRequest {
            survey_id: self.survey_id,
            user_id: identity.user_id,
            access_context_id: access.record_id(),
            payload: self.state.session.responses.clone(),
        };

        let receipt = match self.deps.answers.submit_answers(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Answer submission failed for survey {}: {e}", self.survey_id);
                self.dispatch(Event::SubmitFailed).await;
                return SubmitOutcome::Failed;
            }
        };
        info!(
            "Stored answers {} for survey {} (user {})",
            receipt.id, self.survey_id, identity.user_id
        );

        if let AccessContext::Purchased { id, .. } = &access {
            if let Err(e) = self.deps.access.increment_usage(*id).await {
                warn!("Failed to record usage of access code {id}: {e}");
            }
        }

        self.dispatch(Event::SubmitSucceeded).await;

        let report = ReportRequest {
            user_id: identity.user_id,
            survey_id: self.survey_id,
            answer_id: receipt.id,
            access_context: access,
            responses: request.payload,
        };
        let report_created = match self.deps.reports.create_report(&report).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Report creation deferred for answers {}: {e}", receipt.id);
                self.dispatch(Event::ReportDeferred).await;
                false
            }
        };

        SubmitOutcome::Submitted {
            answer_id: receipt.id,
            report_created,
        }
    }

    /// Explicit "continue" after a successful submission: drops the stored session.
    pub async fn finish(&mut self) -> bool {
        if self.state.session.submission_status != SubmissionStatus::Submitted {
            return false;
        }
        if let Err(e) = self.deps.sessions.clear(self.survey_id).await {
            warn!("Failed to clear session for survey {}: {e}", self.survey_id);
            return false;
        }
        self.state.initialized = false;
        true
    }
}
