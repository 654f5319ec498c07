use std::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use prep_core::model::{AnswerValue, QuestionId};

use super::engine::{
    ConflictResolution, ExplanationLookup, ExplanationOutcome, Notice, SessionEngine,
    StartApplied, StartAttempts, SubmitOutcome,
};
use crate::api::{PracticeApi, StartRequest};
use crate::error::SessionError;

/// Somewhere a `SessionEngine` lives between awaits.
///
/// The workflow never holds the engine across a network call; each closure
/// runs synchronously and returns.
pub trait EngineStore {
    fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R;
}

impl EngineStore for RefCell<SessionEngine> {
    fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

impl EngineStore for Mutex<SessionEngine> {
    fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        let mut guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<S: EngineStore> EngineStore for Arc<S> {
    fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        self.as_ref().with_engine(f)
    }
}

/// What a start request ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// An open session with answers exists; the engine holds it as the
    /// resume candidate.
    ResumeCandidate,
}

/// Drives a `SessionEngine` against a `PracticeApi`.
#[derive(Clone)]
pub struct PracticeLoopService {
    api: Arc<dyn PracticeApi>,
}

impl PracticeLoopService {
    #[must_use]
    pub fn new(api: Arc<dyn PracticeApi>) -> Self {
        Self { api }
    }

    /// Start a session, recovering from conflicts with empty open sessions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StartStuck` when conflicts keep recurring,
    /// `SessionError::Busy` when a request is in flight, or the API error.
    pub async fn start<S>(&self, store: &S, request: &StartRequest) -> Result<StartOutcome, SessionError>
    where
        S: EngineStore,
    {
        let mut attempts = StartAttempts::default();
        let ticket = store.with_engine(SessionEngine::begin_start)?;
        loop {
            attempts.record_attempt();
            debug!(attempt = attempts.attempts(), count = request.count, "starting session");

            let result = self.api.start_session(request).await;
            let applied = store.with_engine(|engine| engine.apply_start(ticket, result))?;
            let conflicting = match applied {
                StartApplied::Started => {
                    info!(attempts = attempts.attempts(), "session started");
                    return Ok(StartOutcome::Started);
                }
                StartApplied::Conflict(session) => *session,
            };

            match attempts.resolve(conflicting) {
                ConflictResolution::Resume(session) => {
                    let session = *session;
                    info!(session_id = %session.id, "open session has answers, offering resume");
                    store.with_engine(|engine| engine.offer_resume(session));
                    return Ok(StartOutcome::ResumeCandidate);
                }
                ConflictResolution::DiscardAndRetry(session_id) => {
                    warn!(%session_id, "discarding empty open session before retrying start");
                    if let Err(err) = self.api.abort_session(session_id).await {
                        warn!(%session_id, error = %err, "abort of conflicting session failed");
                    }
                    store.with_engine(|engine| engine.check_start(ticket))?;
                }
                ConflictResolution::Stuck => {
                    let err = SessionError::StartStuck {
                        attempts: attempts.attempts(),
                    };
                    warn!(attempts = attempts.attempts(), "start keeps conflicting, giving up");
                    store.with_engine(|engine| {
                        engine.cancel_start(Some(Notice::Transport(err.to_string())));
                    });
                    return Err(err);
                }
            }
        }
    }

    /// Throw away the parked resume candidate and start fresh.
    ///
    /// # Errors
    ///
    /// See [`PracticeLoopService::start`].
    pub async fn discard_candidate_and_start<S>(
        &self,
        store: &S,
        request: &StartRequest,
    ) -> Result<StartOutcome, SessionError>
    where
        S: EngineStore,
    {
        if let Some(candidate) = store.with_engine(SessionEngine::take_resume_candidate) {
            info!(session_id = %candidate.id, "discarding resume candidate");
            if let Err(err) = self.api.abort_session(candidate.id).await {
                warn!(session_id = %candidate.id, error = %err, "abort of resume candidate failed");
            }
        }
        self.start(store, request).await
    }

    /// Resume whatever session the server reports as open.
    ///
    /// Returns whether a session was resumed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for busy or failed requests.
    pub async fn resume_active<S>(&self, store: &S) -> Result<bool, SessionError>
    where
        S: EngineStore,
    {
        let ticket = store.with_engine(SessionEngine::begin_resume_active)?;
        let result = self.api.active_session().await;
        let resumed = store.with_engine(|engine| engine.apply_resume_active(ticket, result))?;
        if resumed {
            store.with_engine(|engine| {
                if let Some(session) = engine.session() {
                    info!(session_id = %session.id, answered = session.progress.len(), "resumed session");
                }
            });
        }
        Ok(resumed)
    }

    /// # Errors
    ///
    /// Returns `SessionError` for validation failures, busy or stale requests,
    /// and transport failures.
    pub async fn submit<S>(
        &self,
        store: &S,
        question_id: QuestionId,
        value: AnswerValue,
        elapsed_secs: Option<u32>,
    ) -> Result<SubmitOutcome, SessionError>
    where
        S: EngineStore,
    {
        let pending =
            store.with_engine(|engine| engine.begin_submit(question_id, value, elapsed_secs))?;
        let session_id = pending.session_id;
        let result = self.api.submit_answer(session_id, &pending.request).await;
        let outcome = store.with_engine(|engine| engine.apply_submit(pending, result));

        match &outcome {
            Ok(SubmitOutcome::Recorded(entry)) => {
                debug!(%session_id, %question_id, correct = entry.is_correct, "answer recorded");
            }
            Ok(SubmitOutcome::Reassigned) => {
                warn!(%session_id, "server reassigned questions");
            }
            Ok(SubmitOutcome::SessionDropped) => {
                warn!(%session_id, %question_id, "question unavailable, session dropped");
            }
            Err(SessionError::Stale) => {
                debug!(%session_id, "discarded late answer response");
            }
            Err(err) => warn!(%session_id, error = %err, "submit failed"),
        }
        outcome
    }

    /// Cached explanation, or fetch and cache it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for busy or stale requests and transport failures.
    pub async fn explanation<S>(
        &self,
        store: &S,
        question_id: QuestionId,
    ) -> Result<ExplanationOutcome, SessionError>
    where
        S: EngineStore,
    {
        let lookup = store.with_engine(|engine| engine.begin_explanation(question_id))?;
        let (ticket, session_id) = match lookup {
            ExplanationLookup::Cached(explanation) => {
                return Ok(ExplanationOutcome::Ready(explanation));
            }
            ExplanationLookup::Fetch {
                ticket, session_id, ..
            } => (ticket, session_id),
        };

        let result = self.api.fetch_explanation(session_id, question_id).await;
        let outcome =
            store.with_engine(|engine| engine.apply_explanation(ticket, question_id, result));
        if let Ok(ExplanationOutcome::QuotaExceeded(quota)) = &outcome {
            warn!(%session_id, used = quota.used, limit = quota.limit, "explanation quota exceeded");
        }
        outcome
    }

    /// End the session, then refetch when it was bound to an external task.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the task refetch fails.
    pub async fn finish<S>(&self, store: &S) -> Result<(), SessionError>
    where
        S: EngineStore,
    {
        let Some(finished) = store.with_engine(SessionEngine::finish) else {
            return Ok(());
        };
        info!(session_id = %finished.id, task_bound = finished.task_bound, "finishing session");
        if let Err(err) = self.api.end_session(finished.id).await {
            warn!(session_id = %finished.id, error = %err, "end session request failed");
        }
        if finished.task_bound {
            self.resume_active(store).await?;
        }
        Ok(())
    }

    /// Discard the session locally and tell the server, best effort.
    pub async fn abort<S>(&self, store: &S)
    where
        S: EngineStore,
    {
        let Some(session_id) = store.with_engine(SessionEngine::abort) else {
            return;
        };
        info!(%session_id, "aborting session");
        if let Err(err) = self.api.abort_session(session_id).await {
            warn!(%session_id, error = %err, "abort request failed");
        }
    }
}
