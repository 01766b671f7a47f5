//! In-memory collaborators and survey fixtures for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::prefill::{PrefillError, PrefillResolver, ResumeData, ResumeDataSource};
use crate::report::{ReportRequest, ReportSink};
use crate::survey::collaborators::{
    AccessContext, AccessContexts, AnswerSink, Identity, SubmissionReceipt, SubmissionRequest,
    SurveyError, SurveySource,
};
use crate::survey::engine::{Collaborators, SurveyEngine};
use crate::survey::model::{
    ChoiceConfig, Question, QuestionKind, RankingConfig, Section, Survey,
};
use crate::survey::session::{
    session_key, SessionStore, SessionStoreError, SubmissionStatus, SurveySession,
    DEFAULT_KEY_PREFIX,
};

/// Process-local store holding serialized sessions, so loads see exactly what
/// a real backend would return.
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
    prefix: String,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Stores a raw payload under a survey's key, bypassing serialization.
    pub fn put_raw(&self, survey_id: Uuid, raw: &str) {
        self.lock()
            .insert(session_key(&self.prefix, survey_id), raw.to_string());
    }

    pub fn contains(&self, survey_id: Uuid) -> bool {
        self.lock()
            .contains_key(&session_key(&self.prefix, survey_id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, survey_id: Uuid) -> Result<Option<SurveySession>, SessionStoreError> {
        let raw = self.lock().get(&session_key(&self.prefix, survey_id)).cloned();
        raw.map(|r| serde_json::from_str(&r).map_err(SessionStoreError::from))
            .transpose()
    }

    async fn save(&self, survey_id: Uuid, session: &SurveySession) -> Result<(), SessionStoreError> {
        let payload = serde_json::to_string(session)?;
        self.lock()
            .insert(session_key(&self.prefix, survey_id), payload);
        Ok(())
    }

    async fn clear(&self, survey_id: Uuid) -> Result<(), SessionStoreError> {
        self.lock().remove(&session_key(&self.prefix, survey_id));
        Ok(())
    }
}

pub struct FakeSurveys {
    pub survey: Option<Survey>,
}

#[async_trait]
impl SurveySource for FakeSurveys {
    async fn get_survey(&self, survey_id: Uuid) -> Result<Survey, SurveyError> {
        self.survey
            .clone()
            .filter(|s| s.id == survey_id)
            .ok_or(SurveyError::NotFound(survey_id))
    }
}

/// Records every write, and the session status persisted at the moment of the write.
pub struct FakeAnswers {
    pub sessions: Arc<MemorySessionStore>,
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<SubmissionRequest>>,
    pub status_at_write: Mutex<Vec<Option<SubmissionStatus>>>,
}

impl FakeAnswers {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerSink for FakeAnswers {
    async fn submit_answers(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SurveyError> {
        let stored = self
            .sessions
            .load(request.survey_id)
            .await
            .ok()
            .flatten()
            .map(|s| s.submission_status);
        self.status_at_write.lock().unwrap().push(stored);
        self.calls.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SurveyError::Unavailable("network down".into()));
        }
        Ok(SubmissionReceipt { id: Uuid::new_v4() })
    }
}

#[derive(Default)]
pub struct FakeAccess {
    pub codes: Mutex<HashMap<Uuid, AccessContext>>,
    pub increments: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl AccessContexts for FakeAccess {
    async fn find_purchased(&self, id: Uuid) -> Result<Option<AccessContext>, SurveyError> {
        Ok(self.codes.lock().unwrap().get(&id).cloned())
    }

    async fn increment_usage(&self, id: Uuid) -> Result<(), SurveyError> {
        self.increments.lock().unwrap().push(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeReports {
    pub fail: AtomicBool,
    pub requests: Mutex<Vec<ReportRequest>>,
}

#[async_trait]
impl ReportSink for FakeReports {
    async fn create_report(&self, request: &ReportRequest) -> Result<Uuid, SurveyError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SurveyError::Unavailable("report service down".into()));
        }
        Ok(Uuid::new_v4())
    }
}

pub struct FakeResumes {
    pub data: Option<ResumeData>,
    pub fail: bool,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl ResumeDataSource for FakeResumes {
    async fn get_stored_resume_data(
        &self,
        _user_id: Uuid,
    ) -> Result<Option<ResumeData>, PrefillError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PrefillError::Storage("resume store offline".into()));
        }
        Ok(self.data.clone())
    }
}

pub struct Harness {
    pub survey_id: Uuid,
    pub sessions: Arc<MemorySessionStore>,
    pub answers: Arc<FakeAnswers>,
    pub access: Arc<FakeAccess>,
    pub reports: Arc<FakeReports>,
    pub resumes: Arc<FakeResumes>,
    pub deps: Collaborators,
}

impl Harness {
    pub fn new(survey: Survey) -> Self {
        Self::build(Some(survey), None, false)
    }

    pub fn with_resume(survey: Survey, data: ResumeData) -> Self {
        Self::build(Some(survey), Some(data), false)
    }

    pub fn build(survey: Option<Survey>, resume: Option<ResumeData>, resume_fails: bool) -> Self {
        let survey_id = survey.as_ref().map_or_else(Uuid::new_v4, |s| s.id);
        let sessions = Arc::new(MemorySessionStore::new());
        let answers = Arc::new(FakeAnswers {
            sessions: sessions.clone(),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            status_at_write: Mutex::new(Vec::new()),
        });
        let access = Arc::new(FakeAccess::default());
        let reports = Arc::new(FakeReports::default());
        let resumes = Arc::new(FakeResumes {
            data: resume,
            fail: resume_fails,
            lookups: AtomicUsize::new(0),
        });
        let deps = Collaborators {
            surveys: Arc::new(FakeSurveys { survey }),
            sessions: sessions.clone(),
            answers: answers.clone(),
            access: access.clone(),
            reports: reports.clone(),
            prefill: PrefillResolver::new(resumes.clone()),
        };
        Self {
            survey_id,
            sessions,
            answers,
            access,
            reports,
            resumes,
            deps,
        }
    }

    pub fn engine(&self) -> SurveyEngine {
        SurveyEngine::new(self.survey_id, self.deps.clone())
    }

    /// A fresh engine instance initialized from the shared store, as after a reload.
    pub async fn reload(&self, identity: Option<Identity>) -> SurveyEngine {
        let mut engine = self.engine();
        engine.initialize(identity).await;
        engine
    }
}

pub fn user() -> Identity {
    Identity {
        user_id: Uuid::from_u128(7),
    }
}

pub fn purchased() -> AccessContext {
    AccessContext::Purchased {
        id: Uuid::from_u128(42),
        code: "CAREER-2024".into(),
    }
}

pub fn question(id: &str, label: &str, required: bool, kind: QuestionKind) -> Question {
    Question {
        id: id.into(),
        label: label.into(),
        required,
        order: 0,
        kind,
    }
}

pub fn section(title: &str, order: i32, questions: Vec<Question>) -> Section {
    Section {
        id: Uuid::new_v4(),
        title: title.into(),
        description: Some(format!("About {title}")),
        order,
        questions,
    }
}

pub fn single_choice(choices: &[&str]) -> QuestionKind {
    QuestionKind::SingleChoice(ChoiceConfig {
        choices: choices.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    })
}

pub fn ranking(items: &[&str]) -> QuestionKind {
    QuestionKind::Ranking(RankingConfig {
        items: items.iter().map(|c| c.to_string()).collect(),
    })
}

/// Section A: one required single choice over X/Y. Section B: one required
/// ranking over A/B/C.
pub fn two_section_survey() -> Survey {
    Survey {
        id: Uuid::new_v4(),
        title: "Career Compass".into(),
        sections: vec![
            section(
                "A",
                1,
                vec![question("q1", "Pick one", true, single_choice(&["X", "Y"]))],
            ),
            section(
                "B",
                2,
                vec![question("q2", "Rank these", true, ranking(&["A", "B", "C"]))],
            ),
        ],
    }
}

/// Three sections; the first hides a license question between two visible ones.
pub fn three_section_survey() -> Survey {
    Survey {
        id: Uuid::new_v4(),
        title: "Work Style".into(),
        sections: vec![
            section(
                "Background",
                1,
                vec![
                    question("name", "Your name", true, QuestionKind::ShortText),
                    question("lic", "Enter your license key", true, QuestionKind::ShortText),
                    question("bio", "Anything else?", false, QuestionKind::LongText),
                ],
            ),
            section(
                "Preferences",
                2,
                vec![
                    question("style", "Work style", true, single_choice(&["Remote", "Office"])),
                    question(
                        "skills",
                        "Skills",
                        true,
                        QuestionKind::MultiChoice(ChoiceConfig {
                            choices: ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect(),
                            allow_other: true,
                            min_selections: Some(2),
                            max_selections: Some(3),
                        }),
                    ),
                ],
            ),
            section(
                "Values",
                3,
                vec![question("values", "Rank values", true, ranking(&["Pay", "Growth"]))],
            ),
        ],
    }
}
