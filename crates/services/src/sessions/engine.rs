use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use prep_core::Clock;
use prep_core::model::{
    AnswerValue, AssignedQuestion, Explanation, ProgressEntry, ProgressKey, QuestionId, Quota,
    Session, SessionId, SessionScore,
};

use crate::api::{ExplanationResponse, SubmitRequest, SubmitResult};
use crate::error::{ApiError, ConflictKind, SessionError};

/// Upper bound on start requests issued for one user action.
pub const MAX_START_ATTEMPTS: u32 = 3;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session; the start form is shown.
    Prep,
    /// Waiting for the server to hand out a session.
    Loading,
    /// A session is open and questions can be answered.
    Active,
}

/// Last user-visible message produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server replaced the question list.
    Reassigned,
    /// The session was dropped because a question became unavailable.
    QuestionUnavailable(Option<String>),
    /// Explanation allowance is used up.
    QuotaExceeded(Quota),
    /// A request failed; local state is unchanged.
    Transport(String),
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Reassigned => {
                "Your question set was updated by the server. Answers for removed questions were dropped."
                    .to_string()
            }
            Self::QuestionUnavailable(Some(reason)) => {
                format!("This session ended because a question is no longer available ({reason}).")
            }
            Self::QuestionUnavailable(None) => {
                "This session ended because a question is no longer available.".to_string()
            }
            Self::QuotaExceeded(quota) if quota.limit > 0 => format!(
                "You have used all {} explanations for now.",
                quota.limit
            ),
            // Limit unknown, e.g. an unreadable 429 body.
            Self::QuotaExceeded(_) => "You have used all your explanations for now.".to_string(),
            Self::Transport(message) => format!("Request failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Start,
    ResumeActive,
    Submit,
    Explanation,
}

/// Proof that a request was begun against a particular engine epoch.
///
/// Tickets are consumed by the matching `apply_*` call. A ticket issued
/// before the session was replaced or cleared is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    kind: RequestKind,
    session_id: Option<SessionId>,
}

impl Ticket {
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub ticket: Ticket,
    pub session_id: SessionId,
    pub request: SubmitRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationLookup {
    Cached(Explanation),
    Fetch {
        ticket: Ticket,
        session_id: SessionId,
        question_id: QuestionId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartApplied {
    Started,
    /// Another session is open server-side; the caller decides what to do.
    Conflict(Box<Session>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded(ProgressEntry),
    Reassigned,
    SessionDropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationOutcome {
    Ready(Explanation),
    QuotaExceeded(Quota),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedSession {
    pub id: SessionId,
    /// The session belonged to an external task and must be refetched.
    pub task_bound: bool,
}

//
// ─── START RETRIES ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// The conflicting session has answers; offer it for resumption.
    Resume(Box<Session>),
    /// Abort the empty conflicting session, then start again.
    DiscardAndRetry(SessionId),
    /// Retrying would not make progress.
    Stuck,
}

/// Bookkeeping for the start-conflict retry loop.
///
/// Each distinct empty conflicting session is discarded at most once, and the
/// whole loop issues at most [`MAX_START_ATTEMPTS`] start requests.
#[derive(Debug, Default)]
pub struct StartAttempts {
    attempts: u32,
    discarded: HashSet<SessionId>,
}

impl StartAttempts {
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn resolve(&mut self, conflicting: Session) -> ConflictResolution {
        if conflicting.has_progress() {
            return ConflictResolution::Resume(Box::new(conflicting));
        }
        if self.attempts >= MAX_START_ATTEMPTS || !self.discarded.insert(conflicting.id) {
            return ConflictResolution::Stuck;
        }
        ConflictResolution::DiscardAndRetry(conflicting.id)
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Client-side practice session state.
///
/// All mutation is synchronous. Network calls are split into `begin_*`,
/// which validates and reserves the single in-flight slot, and `apply_*`,
/// which folds the response back in unless the session changed meanwhile.
#[derive(Debug)]
pub struct SessionEngine {
    clock: Clock,
    phase: Phase,
    phase_before_loading: Phase,
    session: Option<Session>,
    index: usize,
    progress: HashMap<ProgressKey, ProgressEntry>,
    explanations: HashMap<ProgressKey, Explanation>,
    quota: Option<Quota>,
    notice: Option<Notice>,
    resume_candidate: Option<Session>,
    in_flight: Option<RequestKind>,
    epoch: u64,
    shown_at: Option<DateTime<Utc>>,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl SessionEngine {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            phase: Phase::Prep,
            phase_before_loading: Phase::Prep,
            session: None,
            index: 0,
            progress: HashMap::new(),
            explanations: HashMap::new(),
            quota: None,
            notice: None,
            resume_candidate: None,
            in_flight: None,
            epoch: 0,
            shown_at: None,
        }
    }

    // ─── Accessors ───

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&AssignedQuestion> {
        self.session
            .as_ref()
            .and_then(|session| session.questions.get(self.index))
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.questions.len())
    }

    #[must_use]
    pub fn progress_for(&self, question_id: QuestionId) -> Option<&ProgressEntry> {
        let key = self.key_for(question_id)?;
        self.progress.get(&key)
    }

    /// Progress keys currently held, in no particular order.
    pub fn progress_keys(&self) -> impl Iterator<Item = &ProgressKey> {
        self.progress.keys()
    }

    #[must_use]
    pub fn explanation_for(&self, question_id: QuestionId) -> Option<&Explanation> {
        let key = self.key_for(question_id)?;
        self.explanations.get(&key)
    }

    #[must_use]
    pub fn quota(&self) -> Option<Quota> {
        self.quota
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    #[must_use]
    pub fn resume_candidate(&self) -> Option<&Session> {
        self.resume_candidate.as_ref()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<RequestKind> {
        self.in_flight
    }

    #[must_use]
    pub fn score(&self) -> SessionScore {
        let Some(session) = self.session.as_ref() else {
            return SessionScore::default();
        };
        SessionScore::from_entries(
            session.questions.len(),
            self.progress
                .iter()
                .filter(|(key, _)| key.session_id == session.id)
                .map(|(_, entry)| entry),
        )
    }

    /// Seconds the current question has been on screen.
    #[must_use]
    pub fn elapsed_on_current(&self) -> u32 {
        self.shown_at
            .map_or(0, |shown_at| self.clock.elapsed_secs(shown_at))
    }

    /// Replace the clock; used by tests that step time.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    fn key_for(&self, question_id: QuestionId) -> Option<ProgressKey> {
        self.session
            .as_ref()
            .map(|session| ProgressKey::new(session.id, question_id))
    }

    // ─── Request bookkeeping ───

    fn reserve(&mut self, kind: RequestKind) -> Result<Ticket, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::Busy);
        }
        self.in_flight = Some(kind);
        Ok(Ticket {
            epoch: self.epoch,
            kind,
            session_id: self.session.as_ref().map(|session| session.id),
        })
    }

    /// Release the in-flight slot, or report the ticket as stale.
    fn settle(&mut self, ticket: Ticket) -> Result<(), SessionError> {
        if ticket.epoch != self.epoch {
            return Err(SessionError::Stale);
        }
        if self.in_flight == Some(ticket.kind) {
            self.in_flight = None;
        }
        Ok(())
    }

    fn enter_loading(&mut self) {
        if self.phase != Phase::Loading {
            self.phase_before_loading = self.phase;
        }
        self.phase = Phase::Loading;
    }

    fn leave_loading(&mut self) {
        if self.phase == Phase::Loading {
            self.phase = self.phase_before_loading;
        }
    }

    /// Install `session` as current. Invalidates outstanding tickets.
    fn install(&mut self, session: Session, index: usize) {
        self.epoch += 1;
        self.in_flight = None;
        self.progress = session
            .progress
            .iter()
            .map(|entry| {
                (
                    ProgressKey::new(session.id, entry.question_id),
                    entry.clone(),
                )
            })
            .collect();
        self.explanations.clear();
        self.index = index;
        self.session = Some(session);
        self.phase = Phase::Active;
        self.notice = None;
        self.resume_candidate = None;
        self.shown_at = Some(self.clock.now());
    }

    /// Drop all session state. Invalidates outstanding tickets.
    fn clear(&mut self, phase: Phase) {
        self.epoch += 1;
        self.in_flight = None;
        self.session = None;
        self.index = 0;
        self.progress.clear();
        self.explanations.clear();
        self.shown_at = None;
        self.phase = phase;
    }

    // ─── Start ───

    /// # Errors
    ///
    /// Returns `SessionError::Busy` while another request is in flight.
    pub fn begin_start(&mut self) -> Result<Ticket, SessionError> {
        let ticket = self.reserve(RequestKind::Start)?;
        self.resume_candidate = None;
        self.enter_loading();
        Ok(ticket)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Stale` for outdated tickets and
    /// `SessionError::Api` for failures other than an active-session conflict.
    pub fn apply_start(
        &mut self,
        ticket: Ticket,
        result: Result<Session, ApiError>,
    ) -> Result<StartApplied, SessionError> {
        match result {
            Ok(session) => {
                self.settle(ticket)?;
                self.install(session, 0);
                Ok(StartApplied::Started)
            }
            // The start slot stays reserved until the conflict is resolved.
            Err(ApiError::Conflict(ConflictKind::ActiveSession { session })) => {
                self.check_start(ticket)?;
                Ok(StartApplied::Conflict(session))
            }
            Err(err) => {
                self.settle(ticket)?;
                self.leave_loading();
                self.notice = Some(Notice::Transport(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Confirm a start ticket still owns the in-flight slot before retrying.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Stale` once the session was replaced or cleared
    /// or the start was cancelled.
    pub fn check_start(&self, ticket: Ticket) -> Result<(), SessionError> {
        if ticket.kind != RequestKind::Start
            || ticket.epoch != self.epoch
            || self.in_flight != Some(RequestKind::Start)
        {
            return Err(SessionError::Stale);
        }
        Ok(())
    }

    /// Park a conflicting session with answers so the user can resume it.
    pub fn offer_resume(&mut self, session: Session) {
        if self.in_flight == Some(RequestKind::Start) {
            self.in_flight = None;
        }
        self.leave_loading();
        self.resume_candidate = Some(session);
    }

    /// Give up on a start attempt, restoring the phase it began from.
    pub fn cancel_start(&mut self, notice: Option<Notice>) {
        if self.in_flight == Some(RequestKind::Start) {
            self.in_flight = None;
        }
        self.leave_loading();
        if notice.is_some() {
            self.notice = notice;
        }
    }

    /// Resume the parked candidate, if any. Returns whether one was resumed.
    pub fn accept_resume_candidate(&mut self) -> bool {
        match self.resume_candidate.take() {
            Some(session) => {
                self.resume(session);
                true
            }
            None => false,
        }
    }

    pub fn take_resume_candidate(&mut self) -> Option<Session> {
        self.resume_candidate.take()
    }

    // ─── Resume ───

    /// Rebuild progress from `session` and land on its first unanswered question.
    pub fn resume(&mut self, session: Session) {
        let index = session.resume_index();
        self.install(session, index);
    }

    /// # Errors
    ///
    /// Returns `SessionError::Busy` while another request is in flight.
    pub fn begin_resume_active(&mut self) -> Result<Ticket, SessionError> {
        let ticket = self.reserve(RequestKind::ResumeActive)?;
        self.enter_loading();
        Ok(ticket)
    }

    /// Returns whether a session was resumed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Stale` for outdated tickets and
    /// `SessionError::Api` for transport failures.
    pub fn apply_resume_active(
        &mut self,
        ticket: Ticket,
        result: Result<Option<Session>, ApiError>,
    ) -> Result<bool, SessionError> {
        self.settle(ticket)?;
        match result {
            Ok(Some(session)) => {
                self.resume(session);
                Ok(true)
            }
            Ok(None) => {
                self.leave_loading();
                Ok(false)
            }
            Err(err) => {
                self.leave_loading();
                self.notice = Some(Notice::Transport(err.to_string()));
                Err(err.into())
            }
        }
    }

    // ─── Answering ───

    /// Validate an answer and reserve the request slot.
    ///
    /// `elapsed_secs` defaults to the time the current question has been shown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when busy, without a session, for unknown or
    /// unavailable questions, or for a blank answer.
    pub fn begin_submit(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
        elapsed_secs: Option<u32>,
    ) -> Result<SubmitTicket, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::Busy);
        }
        let session = self
            .session
            .as_ref()
            .filter(|_| self.phase == Phase::Active)
            .ok_or(SessionError::NoSession)?;
        let session_id = session.id;
        let question = session
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        if let Some(reason) = question.unavailable_reason() {
            return Err(SessionError::Unavailable {
                id: question_id,
                reason: reason.message(),
            });
        }
        if value.is_blank() {
            return Err(SessionError::EmptyAnswer);
        }

        let elapsed_secs = elapsed_secs.unwrap_or_else(|| self.elapsed_on_current());
        let ticket = self.reserve(RequestKind::Submit)?;
        Ok(SubmitTicket {
            ticket,
            session_id,
            request: SubmitRequest {
                question_id,
                value,
                elapsed_secs: Some(elapsed_secs),
            },
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::Stale` for late responses and
    /// `SessionError::Api` for transport failures (state is left unchanged).
    pub fn apply_submit(
        &mut self,
        pending: SubmitTicket,
        result: Result<SubmitResult, ApiError>,
    ) -> Result<SubmitOutcome, SessionError> {
        self.settle(pending.ticket)?;
        match result {
            Ok(result) => {
                let request = pending.request;
                let entry = ProgressEntry {
                    question_id: request.question_id,
                    value: request.value,
                    is_correct: result.is_correct,
                    log_id: result.log_id,
                    elapsed_secs: request.elapsed_secs.unwrap_or(0),
                    revealed: false,
                };
                self.progress.insert(
                    ProgressKey::new(pending.session_id, entry.question_id),
                    entry.clone(),
                );
                if let Some(session) = self.session.as_mut() {
                    session.record_progress(entry.clone());
                }
                self.notice = None;
                Ok(SubmitOutcome::Recorded(entry))
            }
            Err(ApiError::Conflict(ConflictKind::Reassigned { session })) => {
                self.apply_reassignment(*session);
                Ok(SubmitOutcome::Reassigned)
            }
            Err(ApiError::Conflict(ConflictKind::Unavailable { reason, .. })) => {
                self.clear(Phase::Prep);
                self.notice = Some(Notice::QuestionUnavailable(reason));
                Ok(SubmitOutcome::SessionDropped)
            }
            Err(err) => {
                self.notice = Some(Notice::Transport(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Adopt the server's question list and prune everything keyed to
    /// questions that are gone.
    fn apply_reassignment(&mut self, server: Session) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.questions = server.questions;
        session.retain_assigned_progress();

        let session_id = session.id;
        let assigned = session.question_ids();
        let keep = |key: &ProgressKey| key.session_id == session_id && assigned.contains(&key.question_id);
        self.progress.retain(|key, _| keep(key));
        self.explanations.retain(|key, _| keep(key));

        let last = session.questions.len().saturating_sub(1);
        self.index = self.index.min(last);
        self.shown_at = Some(self.clock.now());
        self.notice = Some(Notice::Reassigned);
    }

    /// Mark the answer to `question_id` as revealed and return the canonical answer.
    pub fn reveal_answer(&mut self, question_id: QuestionId) -> Option<String> {
        let key = self.key_for(question_id)?;
        let session = self.session.as_mut()?;
        let answer = session.question(question_id)?.correct_answer.clone();
        if let Some(entry) = self.progress.get_mut(&key) {
            entry.revealed = true;
            session.record_progress(entry.clone());
        }
        answer
    }

    // ─── Explanations ───

    /// Return a cached explanation or reserve a fetch for it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` without a session, for unknown questions, or
    /// when another request is in flight.
    pub fn begin_explanation(
        &mut self,
        question_id: QuestionId,
    ) -> Result<ExplanationLookup, SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if session.question(question_id).is_none() {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        let session_id = session.id;
        if let Some(cached) = self.explanations.get(&ProgressKey::new(session_id, question_id)) {
            return Ok(ExplanationLookup::Cached(cached.clone()));
        }
        let ticket = self.reserve(RequestKind::Explanation)?;
        Ok(ExplanationLookup::Fetch {
            ticket,
            session_id,
            question_id,
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::Stale` for late responses and
    /// `SessionError::Api` for transport failures.
    pub fn apply_explanation(
        &mut self,
        ticket: Ticket,
        question_id: QuestionId,
        result: Result<ExplanationResponse, ApiError>,
    ) -> Result<ExplanationOutcome, SessionError> {
        self.settle(ticket)?;
        let session_id = ticket.session_id.ok_or(SessionError::NoSession)?;
        match result {
            Ok(response) => {
                if let Some(quota) = response.quota {
                    self.quota = Some(quota);
                }
                self.explanations.insert(
                    ProgressKey::new(session_id, question_id),
                    response.explanation.clone(),
                );
                self.notice = None;
                Ok(ExplanationOutcome::Ready(response.explanation))
            }
            Err(ApiError::QuotaExceeded(quota)) => {
                self.quota = Some(quota);
                self.notice = Some(Notice::QuotaExceeded(quota));
                Ok(ExplanationOutcome::QuotaExceeded(quota))
            }
            Err(err) => {
                self.notice = Some(Notice::Transport(err.to_string()));
                Err(err.into())
            }
        }
    }

    // ─── Navigation ───

    /// # Errors
    ///
    /// Returns `SessionError::NoSession` or `SessionError::OutOfRange`.
    pub fn go_to(&mut self, index: usize) -> Result<(), SessionError> {
        let len = self
            .session
            .as_ref()
            .map(|session| session.questions.len())
            .ok_or(SessionError::NoSession)?;
        if index >= len {
            return Err(SessionError::OutOfRange { index, len });
        }
        if index != self.index {
            self.index = index;
            self.shown_at = Some(self.clock.now());
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` past the last question.
    pub fn next(&mut self) -> Result<(), SessionError> {
        self.go_to(self.index + 1)
    }

    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` before the first question.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        let len = self.question_count();
        let index = self
            .index
            .checked_sub(1)
            .ok_or(SessionError::OutOfRange { index: 0, len })?;
        self.go_to(index)
    }

    // ─── Terminal transitions ───

    /// End the session locally. Task-bound sessions go to `Loading` so the
    /// caller can refetch the task's next session.
    pub fn finish(&mut self) -> Option<FinishedSession> {
        let session = self.session.as_ref()?;
        let finished = FinishedSession {
            id: session.id,
            task_bound: session.is_task_bound(),
        };
        if finished.task_bound {
            self.phase_before_loading = Phase::Prep;
            self.clear(Phase::Loading);
        } else {
            self.clear(Phase::Prep);
        }
        self.notice = None;
        Some(finished)
    }

    /// Discard the session locally; in-flight responses become stale.
    pub fn abort(&mut self) -> Option<SessionId> {
        let id = self.session.as_ref().map(|session| session.id)?;
        self.clear(Phase::Prep);
        self.notice = None;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{AnswerFormat, Choice, LogId, SessionType};
    use prep_core::time::fixed_clock;

    fn question(id: u64) -> AssignedQuestion {
        AssignedQuestion {
            id: QuestionId::new(id),
            section: "math".into(),
            sub_section: None,
            stem: format!("Question {id}"),
            passage: None,
            format: AnswerFormat::Choices {
                choices: vec![Choice::new("A", "one"), Choice::new("B", "two")],
            },
            figures: Vec::new(),
            correct_answer: Some("B".into()),
            unavailable_reason: None,
        }
    }

    fn session(id: u64, question_ids: &[u64]) -> Session {
        Session {
            id: SessionId::new(id),
            session_type: SessionType::Standard,
            questions: question_ids.iter().copied().map(question).collect(),
            progress: Vec::new(),
            source_id: None,
            started_at: None,
        }
    }

    fn active(question_ids: &[u64]) -> SessionEngine {
        let mut engine = SessionEngine::new(fixed_clock());
        let ticket = engine.begin_start().unwrap();
        engine
            .apply_start(ticket, Ok(session(1, question_ids)))
            .unwrap();
        engine
    }

    fn answer(engine: &mut SessionEngine, question_id: u64, correct: bool) -> SubmitOutcome {
        let pending = engine
            .begin_submit(QuestionId::new(question_id), AnswerValue::new("B"), Some(5))
            .unwrap();
        engine
            .apply_submit(
                pending,
                Ok(SubmitResult {
                    is_correct: correct,
                    log_id: Some(LogId::new(question_id * 10)),
                }),
            )
            .unwrap()
    }

    #[test]
    fn start_enters_active_at_first_question() {
        let mut engine = SessionEngine::new(fixed_clock());
        let ticket = engine.begin_start().unwrap();
        assert_eq!(engine.phase(), Phase::Loading);
        engine.apply_start(ticket, Ok(session(1, &[1, 2]))).unwrap();
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.score().answered, 0);
        assert!(!engine.is_busy());
    }

    #[test]
    fn failed_start_returns_to_prep_with_notice() {
        let mut engine = SessionEngine::new(fixed_clock());
        let ticket = engine.begin_start().unwrap();
        let err = engine
            .apply_start(ticket, Err(ApiError::Status(reqwest::StatusCode::BAD_GATEWAY)))
            .unwrap_err();
        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(engine.phase(), Phase::Prep);
        assert!(matches!(engine.notice(), Some(Notice::Transport(_))));
    }

    #[test]
    fn submit_records_progress_and_mirrors_into_session() {
        let mut engine = active(&[1, 2, 3]);
        let outcome = answer(&mut engine, 2, true);
        let SubmitOutcome::Recorded(entry) = outcome else {
            panic!("expected recorded outcome");
        };
        assert_eq!(entry.log_id, Some(LogId::new(20)));
        assert_eq!(engine.progress_for(QuestionId::new(2)), Some(&entry));
        assert_eq!(engine.session().unwrap().progress, vec![entry]);
        assert_eq!(engine.score().correct, 1);
    }

    #[test]
    fn duplicate_submit_is_refused_while_in_flight() {
        let mut engine = active(&[1, 2]);
        let pending = engine
            .begin_submit(QuestionId::new(1), AnswerValue::new("A"), None)
            .unwrap();
        let second = engine.begin_submit(QuestionId::new(1), AnswerValue::new("A"), None);
        assert!(matches!(second, Err(SessionError::Busy)));
        assert!(matches!(
            engine.begin_explanation(QuestionId::new(1)),
            Err(SessionError::Busy)
        ));
        engine
            .apply_submit(
                pending,
                Ok(SubmitResult {
                    is_correct: false,
                    log_id: None,
                }),
            )
            .unwrap();
        assert!(!engine.is_busy());
    }

    #[test]
    fn late_response_after_abort_is_stale() {
        let mut engine = active(&[1, 2]);
        let pending = engine
            .begin_submit(QuestionId::new(1), AnswerValue::new("B"), Some(3))
            .unwrap();
        assert_eq!(engine.abort(), Some(SessionId::new(1)));
        assert_eq!(engine.phase(), Phase::Prep);

        let late = engine.apply_submit(
            pending,
            Ok(SubmitResult {
                is_correct: true,
                log_id: None,
            }),
        );
        assert!(matches!(late, Err(SessionError::Stale)));
        assert!(engine.session().is_none());
        assert_eq!(engine.progress_keys().count(), 0);
    }

    #[test]
    fn reassignment_prunes_progress_and_clamps_index() {
        let mut engine = active(&[1, 2, 3, 4]);
        answer(&mut engine, 1, true);
        answer(&mut engine, 3, false);
        engine.go_to(3).unwrap();

        let pending = engine
            .begin_submit(QuestionId::new(4), AnswerValue::new("B"), None)
            .unwrap();
        let outcome = engine
            .apply_submit(
                pending,
                Err(ApiError::Conflict(ConflictKind::Reassigned {
                    session: Box::new(session(1, &[3, 5])),
                })),
            )
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Reassigned);
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.current_index(), 1);
        assert_eq!(engine.notice(), Some(&Notice::Reassigned));
        let assigned = engine.session().unwrap().question_ids();
        assert!(engine
            .progress_keys()
            .all(|key| assigned.contains(&key.question_id)));
        assert_eq!(engine.progress_keys().count(), 1);
        assert_eq!(engine.session().unwrap().progress.len(), 1);
    }

    #[test]
    fn unavailable_conflict_drops_session() {
        let mut engine = active(&[1, 2]);
        let pending = engine
            .begin_submit(QuestionId::new(1), AnswerValue::new("A"), None)
            .unwrap();
        let outcome = engine
            .apply_submit(
                pending,
                Err(ApiError::Conflict(ConflictKind::Unavailable {
                    question_id: Some(QuestionId::new(1)),
                    reason: Some("retired".into()),
                })),
            )
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::SessionDropped);
        assert_eq!(engine.phase(), Phase::Prep);
        assert!(engine.session().is_none());
        assert_eq!(
            engine.notice(),
            Some(&Notice::QuestionUnavailable(Some("retired".into())))
        );
    }

    #[test]
    fn transport_error_leaves_state_unchanged() {
        let mut engine = active(&[1, 2]);
        answer(&mut engine, 1, true);
        let pending = engine
            .begin_submit(QuestionId::new(2), AnswerValue::new("A"), None)
            .unwrap();
        let result = engine.apply_submit(
            pending,
            Err(ApiError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE)),
        );
        assert!(matches!(result, Err(SessionError::Api(_))));
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.score().answered, 1);
        assert!(!engine.is_busy());
    }

    #[test]
    fn unavailable_question_cannot_be_answered_but_can_be_visited() {
        let mut broken = session(1, &[1, 2]);
        broken.questions[1].correct_answer = None;
        let mut engine = SessionEngine::new(fixed_clock());
        engine.resume(broken);
        engine.go_to(1).unwrap();
        let err = engine
            .begin_submit(QuestionId::new(2), AnswerValue::new("A"), None)
            .unwrap_err();
        assert!(matches!(err, SessionError::Unavailable { .. }));
        assert!(!engine.is_busy());
    }

    #[test]
    fn resume_lands_on_first_unanswered() {
        let mut existing = session(7, &[1, 2, 3]);
        existing.progress.push(ProgressEntry {
            question_id: QuestionId::new(1),
            value: AnswerValue::new("B"),
            is_correct: true,
            log_id: Some(LogId::new(1)),
            elapsed_secs: 4,
            revealed: false,
        });
        let mut engine = SessionEngine::new(fixed_clock());
        engine.resume(existing);
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.current_index(), 1);
        assert!(engine.progress_for(QuestionId::new(1)).is_some());
    }

    #[test]
    fn explanation_is_cached_per_question() {
        let mut engine = active(&[1]);
        let lookup = engine.begin_explanation(QuestionId::new(1)).unwrap();
        let ExplanationLookup::Fetch { ticket, .. } = lookup else {
            panic!("expected a fetch");
        };
        engine
            .apply_explanation(
                ticket,
                QuestionId::new(1),
                Ok(ExplanationResponse {
                    explanation: Explanation::default(),
                    quota: Some(Quota {
                        used: 1,
                        limit: 5,
                        remaining: 4,
                    }),
                }),
            )
            .unwrap();
        assert!(matches!(
            engine.begin_explanation(QuestionId::new(1)).unwrap(),
            ExplanationLookup::Cached(_)
        ));
        assert_eq!(engine.quota().map(|quota| quota.remaining), Some(4));
    }

    #[test]
    fn quota_exceeded_is_not_fatal() {
        let mut engine = active(&[1]);
        let ExplanationLookup::Fetch { ticket, .. } =
            engine.begin_explanation(QuestionId::new(1)).unwrap()
        else {
            panic!("expected a fetch");
        };
        let quota = Quota {
            used: 3,
            limit: 3,
            remaining: 0,
        };
        let outcome = engine
            .apply_explanation(ticket, QuestionId::new(1), Err(ApiError::QuotaExceeded(quota)))
            .unwrap();
        assert_eq!(outcome, ExplanationOutcome::QuotaExceeded(quota));
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.quota(), Some(quota));
        assert!(engine.explanation_for(QuestionId::new(1)).is_none());
        assert_eq!(
            engine.notice().map(Notice::message).as_deref(),
            Some("You have used all 3 explanations for now.")
        );
    }

    #[test]
    fn quota_notice_without_known_limit_stays_generic() {
        let message = Notice::QuotaExceeded(Quota::default()).message();
        assert_eq!(message, "You have used all your explanations for now.");
        assert!(!message.contains('0'));
    }

    #[test]
    fn navigation_is_bounded() {
        let mut engine = active(&[1, 2]);
        assert!(engine.previous().is_err());
        engine.next().unwrap();
        assert!(matches!(
            engine.next(),
            Err(SessionError::OutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(engine.current_index(), 1);
    }

    #[test]
    fn elapsed_time_defaults_from_clock() {
        let mut engine = active(&[1, 2]);
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(30));
        engine.set_clock(clock);
        let pending = engine
            .begin_submit(QuestionId::new(1), AnswerValue::new("B"), None)
            .unwrap();
        assert_eq!(pending.request.elapsed_secs, Some(30));
    }

    #[test]
    fn finish_of_task_bound_session_waits_for_refetch() {
        let mut bound = session(3, &[1]);
        bound.source_id = Some("assignment-9".into());
        let mut engine = SessionEngine::new(fixed_clock());
        engine.resume(bound);
        let finished = engine.finish().unwrap();
        assert!(finished.task_bound);
        assert_eq!(engine.phase(), Phase::Loading);

        let ticket = engine.begin_resume_active().unwrap();
        assert!(!engine.apply_resume_active(ticket, Ok(None)).unwrap());
        assert_eq!(engine.phase(), Phase::Prep);
    }

    #[test]
    fn reveal_marks_progress_entry() {
        let mut engine = active(&[1]);
        answer(&mut engine, 1, false);
        assert_eq!(engine.reveal_answer(QuestionId::new(1)).as_deref(), Some("B"));
        assert!(engine.progress_for(QuestionId::new(1)).unwrap().revealed);
    }

    #[test]
    fn start_stays_reserved_across_conflict() {
        let mut engine = SessionEngine::new(fixed_clock());
        let ticket = engine.begin_start().unwrap();
        let applied = engine
            .apply_start(
                ticket,
                Err(ApiError::Conflict(ConflictKind::ActiveSession {
                    session: Box::new(session(9, &[1])),
                })),
            )
            .unwrap();
        assert!(matches!(applied, StartApplied::Conflict(_)));
        assert_eq!(engine.phase(), Phase::Loading);
        assert!(engine.is_busy());
        assert!(matches!(engine.begin_start(), Err(SessionError::Busy)));

        engine.check_start(ticket).unwrap();
        engine.apply_start(ticket, Ok(session(2, &[1]))).unwrap();
        assert_eq!(engine.phase(), Phase::Active);
        assert!(!engine.is_busy());
    }

    #[test]
    fn offered_resume_releases_start() {
        let mut engine = SessionEngine::new(fixed_clock());
        let ticket = engine.begin_start().unwrap();
        engine
            .apply_start(
                ticket,
                Err(ApiError::Conflict(ConflictKind::ActiveSession {
                    session: Box::new(session(9, &[1])),
                })),
            )
            .unwrap();
        engine.offer_resume(session(9, &[1]));
        assert!(!engine.is_busy());
        assert_eq!(engine.phase(), Phase::Prep);
        assert!(matches!(engine.check_start(ticket), Err(SessionError::Stale)));
    }

    #[test]
    fn conflict_resolution_retries_each_empty_session_once() {
        let mut attempts = StartAttempts::default();
        attempts.record_attempt();
        assert_eq!(
            attempts.resolve(session(4, &[1])),
            ConflictResolution::DiscardAndRetry(SessionId::new(4))
        );
        attempts.record_attempt();
        assert_eq!(attempts.resolve(session(4, &[1])), ConflictResolution::Stuck);
    }

    #[test]
    fn conflict_with_progress_is_offered_for_resume() {
        let mut attempts = StartAttempts::default();
        attempts.record_attempt();
        let mut answered = session(4, &[1]);
        answered.progress.push(ProgressEntry {
            question_id: QuestionId::new(1),
            value: AnswerValue::new("A"),
            is_correct: false,
            log_id: None,
            elapsed_secs: 0,
            revealed: false,
        });
        assert!(matches!(
            attempts.resolve(answered),
            ConflictResolution::Resume(_)
        ));
    }

    #[test]
    fn attempt_cap_is_stuck() {
        let mut attempts = StartAttempts::default();
        for id in 1..=u64::from(MAX_START_ATTEMPTS) {
            attempts.record_attempt();
            let resolution = attempts.resolve(session(id, &[]));
            if id < u64::from(MAX_START_ATTEMPTS) {
                assert_eq!(resolution, ConflictResolution::DiscardAndRetry(SessionId::new(id)));
            } else {
                assert_eq!(resolution, ConflictResolution::Stuck);
            }
        }
    }
}
