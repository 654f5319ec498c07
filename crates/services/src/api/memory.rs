use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use prep_core::Clock;
use prep_core::model::{
    AssignedQuestion, CaptureTarget, DirectiveAction, DirectiveTarget, Explanation,
    ExplanationStep, FigureSource, LogId, Narration, ProgressEntry, QuestionId, Quota, Session,
    SessionId, SessionType, StepDirective,
};

use super::{
    ExplanationResponse, FigureApi, FigureUpload, PracticeApi, StartRequest, SubmitRequest,
    SubmitResult, UploadedFigure,
};
use crate::error::{ApiError, ConflictKind};

/// A request observed by [`InMemoryApi`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Start(StartRequest),
    ActiveSession,
    Submit {
        session_id: SessionId,
        question_id: QuestionId,
    },
    Explanation {
        session_id: SessionId,
        question_id: QuestionId,
    },
    Abort(SessionId),
    End(SessionId),
    PageSource {
        target: CaptureTarget,
        page: Option<u32>,
    },
    Upload(CaptureTarget),
}

#[derive(Default)]
struct ServerState {
    bank: Vec<AssignedQuestion>,
    sessions: HashMap<SessionId, Session>,
    active: Option<SessionId>,
    next_session_id: u64,
    next_log_id: u64,
    explanations: HashMap<QuestionId, Explanation>,
    quota: Quota,
    retired: HashMap<QuestionId, String>,
    start_conflicts: VecDeque<Session>,
    pending_reassignment: Option<Vec<AssignedQuestion>>,
    failures: VecDeque<StatusCode>,
    sources: HashMap<CaptureTarget, FigureSource>,
    uploads: Vec<(CaptureTarget, FigureUpload)>,
    calls: Vec<ApiCall>,
}

/// Server simulation used by offline mode and tests.
///
/// Sessions, progress and quota behave like the real endpoints, including
/// 409 conflicts and 429 quota responses. Test hooks script conflicts and
/// transport failures ahead of time.
#[derive(Clone)]
pub struct InMemoryApi {
    clock: Clock,
    state: Arc<Mutex<ServerState>>,
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryApi {
    #[must_use]
    pub fn new(bank: Vec<AssignedQuestion>) -> Self {
        Self {
            clock: Clock::default(),
            state: Arc::new(Mutex::new(ServerState {
                bank,
                next_session_id: 1,
                next_log_id: 1,
                ..ServerState::default()
            })),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Limit explanation generation to `limit` fetches.
    #[must_use]
    pub fn with_quota(self, limit: u32) -> Self {
        self.lock().quota = Quota {
            used: 0,
            limit,
            remaining: limit,
        };
        self
    }

    #[must_use]
    pub fn with_explanation(self, question_id: QuestionId, explanation: Explanation) -> Self {
        self.lock().explanations.insert(question_id, explanation);
        self
    }

    #[must_use]
    pub fn with_source(self, target: CaptureTarget, source: FigureSource) -> Self {
        self.lock().sources.insert(target, source);
        self
    }

    /// Store `session` as the caller's open session.
    pub fn seed_active(&self, session: Session) {
        let mut state = self.lock();
        state.next_session_id = state.next_session_id.max(session.id.value() + 1);
        state.active = Some(session.id);
        state.sessions.insert(session.id, session);
    }

    /// Answer the next start requests with conflicts naming these sessions,
    /// regardless of actual server state.
    pub fn script_start_conflicts(&self, sessions: impl IntoIterator<Item = Session>) {
        self.lock().start_conflicts.extend(sessions);
    }

    /// Rewrite the active session's question list on the next submission.
    pub fn reassign_on_next_submit(&self, questions: Vec<AssignedQuestion>) {
        self.lock().pending_reassignment = Some(questions);
    }

    /// Make a question unanswerable server-side.
    pub fn retire_question(&self, question_id: QuestionId, reason: impl Into<String>) {
        self.lock().retired.insert(question_id, reason.into());
    }

    /// Fail the next request with a bare status code.
    pub fn fail_next(&self, status: StatusCode) {
        self.lock().failures.push_back(status);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn count_calls(&self, matches: impl Fn(&ApiCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| matches(call)).count()
    }

    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.lock().sessions.get(&id).cloned()
    }

    #[must_use]
    pub fn active_id(&self) -> Option<SessionId> {
        self.lock().active
    }

    #[must_use]
    pub fn quota(&self) -> Quota {
        self.lock().quota
    }

    #[must_use]
    pub fn uploads(&self) -> Vec<(CaptureTarget, FigureUpload)> {
        self.lock().uploads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call` and pop any scripted failure.
    fn enter(&self, call: ApiCall) -> Result<MutexGuard<'_, ServerState>, ApiError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(status) => Err(ApiError::Status(status)),
            None => Ok(state),
        }
    }
}

impl ServerState {
    fn open_session(&mut self, id: SessionId) -> Result<&mut Session, ApiError> {
        if self.active != Some(id) {
            return Err(ApiError::NotFound);
        }
        self.sessions.get_mut(&id).ok_or(ApiError::NotFound)
    }

    fn close(&mut self, id: SessionId) {
        if self.active == Some(id) {
            self.active = None;
        }
    }
}

#[async_trait]
impl PracticeApi for InMemoryApi {
    async fn start_session(&self, request: &StartRequest) -> Result<Session, ApiError> {
        let mut state = self.enter(ApiCall::Start(request.clone()))?;

        if let Some(conflicting) = state.start_conflicts.pop_front() {
            return Err(ApiError::Conflict(ConflictKind::ActiveSession {
                session: Box::new(conflicting),
            }));
        }
        if let Some(active) = state.active.and_then(|id| state.sessions.get(&id)) {
            return Err(ApiError::Conflict(ConflictKind::ActiveSession {
                session: Box::new(active.clone()),
            }));
        }

        let section = request
            .section
            .as_deref()
            .map(str::trim)
            .filter(|section| !section.is_empty());
        let count = usize::try_from(request.count).unwrap_or(usize::MAX);
        let questions: Vec<AssignedQuestion> = state
            .bank
            .iter()
            .filter(|question| section.is_none_or(|section| question.section == section))
            .take(count)
            .cloned()
            .collect();

        let id = SessionId::new(state.next_session_id);
        state.next_session_id += 1;
        let session = Session {
            id,
            session_type: SessionType::Standard,
            questions,
            progress: Vec::new(),
            source_id: request.source_id.clone(),
            started_at: Some(self.clock.now()),
        };
        state.sessions.insert(id, session.clone());
        state.active = Some(id);
        Ok(session)
    }

    async fn active_session(&self) -> Result<Option<Session>, ApiError> {
        let state = self.enter(ApiCall::ActiveSession)?;
        Ok(state.active.and_then(|id| state.sessions.get(&id).cloned()))
    }

    async fn submit_answer(
        &self,
        session_id: SessionId,
        request: &SubmitRequest,
    ) -> Result<SubmitResult, ApiError> {
        let mut state = self.enter(ApiCall::Submit {
            session_id,
            question_id: request.question_id,
        })?;

        if let Some(reason) = state.retired.get(&request.question_id).cloned() {
            state.close(session_id);
            return Err(ApiError::Conflict(ConflictKind::Unavailable {
                question_id: Some(request.question_id),
                reason: Some(reason),
            }));
        }

        if let Some(questions) = state.pending_reassignment.take() {
            let session = state.open_session(session_id)?;
            session.questions = questions;
            session.retain_assigned_progress();
            return Err(ApiError::Conflict(ConflictKind::Reassigned {
                session: Box::new(session.clone()),
            }));
        }

        let log_id = LogId::new(state.next_log_id);
        state.next_log_id += 1;
        let session = state.open_session(session_id)?;
        let question = session
            .question(request.question_id)
            .ok_or(ApiError::NotFound)?;
        let is_correct = question.is_correct(&request.value).unwrap_or(false);
        session.record_progress(ProgressEntry {
            question_id: request.question_id,
            value: request.value.clone(),
            is_correct,
            log_id: Some(log_id),
            elapsed_secs: request.elapsed_secs.unwrap_or(0),
            revealed: false,
        });

        Ok(SubmitResult {
            is_correct,
            log_id: Some(log_id),
        })
    }

    async fn fetch_explanation(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<ExplanationResponse, ApiError> {
        let mut state = self.enter(ApiCall::Explanation {
            session_id,
            question_id,
        })?;

        let question = state
            .sessions
            .get(&session_id)
            .and_then(|session| session.question(question_id))
            .cloned()
            .ok_or(ApiError::NotFound)?;

        let quota = state.quota;
        if quota.limit > 0 {
            if quota.remaining == 0 {
                return Err(ApiError::QuotaExceeded(quota));
            }
            state.quota.used += 1;
            state.quota.remaining -= 1;
        }

        let explanation = state
            .explanations
            .get(&question_id)
            .cloned()
            .unwrap_or_else(|| fallback_explanation(&question));
        Ok(ExplanationResponse {
            explanation,
            quota: (state.quota.limit > 0).then_some(state.quota),
        })
    }

    async fn abort_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        let mut state = self.enter(ApiCall::Abort(session_id))?;
        state.close(session_id);
        Ok(())
    }

    async fn end_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        let mut state = self.enter(ApiCall::End(session_id))?;
        state.close(session_id);
        Ok(())
    }
}

#[async_trait]
impl FigureApi for InMemoryApi {
    async fn fetch_page_source(
        &self,
        target: CaptureTarget,
        page: Option<u32>,
    ) -> Result<FigureSource, ApiError> {
        let state = self.enter(ApiCall::PageSource { target, page })?;
        let mut source = state.sources.get(&target).cloned().ok_or(ApiError::NotFound)?;
        if let Some(page) = page {
            source.page = page;
        }
        Ok(source)
    }

    async fn upload_figure(
        &self,
        target: CaptureTarget,
        upload: &FigureUpload,
    ) -> Result<UploadedFigure, ApiError> {
        let mut state = self.enter(ApiCall::Upload(target))?;
        state.uploads.push((target, upload.clone()));
        let index = state.uploads.len();
        Ok(UploadedFigure {
            id: format!("fig-{index}"),
            url: format!("memory://figures/{}/{index}.png", target.path_segment()),
        })
    }
}

/// One-step explanation for questions without an authored one.
fn fallback_explanation(question: &AssignedQuestion) -> Explanation {
    let answer = question.correct_answer.clone().unwrap_or_default();
    let mut directives = Vec::new();
    let known: HashSet<&str> = question.choices().iter().map(|choice| choice.key.as_str()).collect();
    if known.contains(answer.as_str()) {
        directives.push(
            StepDirective::new(DirectiveTarget::Choices, "", DirectiveAction::Circle)
                .with_choice(answer.clone()),
        );
    }
    Explanation {
        language: Some("en".to_string()),
        steps: vec![ExplanationStep {
            title: "Answer".to_string(),
            step_type: "answer".to_string(),
            narration: Narration::Plain(format!("The correct answer is {answer}.")),
            duration_ms: 2000,
            delay_ms: 0,
            directives,
            board_notes: Vec::new(),
        }],
        summary: None,
    }
}
