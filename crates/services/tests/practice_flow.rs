use std::cell::RefCell;
use std::sync::Arc;

use prep_core::model::{
    AnswerValue, LogId, ProgressEntry, QuestionId, Session, SessionId, SessionType,
};
use prep_core::time::fixed_clock;
use reqwest::StatusCode;
use services::api::{ApiCall, InMemoryApi, StartRequest, demo_questions};
use services::sessions::{
    ExplanationOutcome, Notice, Phase, SessionEngine, StartOutcome, SubmitOutcome,
};
use services::{PracticeLoopService, SessionError};

fn engine() -> RefCell<SessionEngine> {
    RefCell::new(SessionEngine::new(fixed_clock()))
}

fn service(api: &InMemoryApi) -> PracticeLoopService {
    PracticeLoopService::new(Arc::new(api.clone()))
}

fn open_session(id: u64, answered: &[u64]) -> Session {
    Session {
        id: SessionId::new(id),
        session_type: SessionType::Standard,
        questions: demo_questions().into_iter().take(3).collect(),
        progress: answered
            .iter()
            .map(|question| ProgressEntry {
                question_id: QuestionId::new(*question),
                value: AnswerValue::new("A"),
                is_correct: false,
                log_id: Some(LogId::new(*question)),
                elapsed_secs: 5,
                revealed: false,
            })
            .collect(),
        source_id: None,
        started_at: None,
    }
}

fn is_abort(call: &ApiCall) -> bool {
    matches!(call, ApiCall::Abort(_))
}

async fn started(api: &InMemoryApi, count: u32) -> RefCell<SessionEngine> {
    let store = engine();
    let outcome = service(api)
        .start(&store, &StartRequest::new(count))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    store
}

#[tokio::test]
async fn empty_conflicting_session_is_aborted_once_then_retried() {
    let api = InMemoryApi::new(demo_questions());
    api.seed_active(open_session(50, &[]));
    let store = engine();

    let outcome = service(&api)
        .start(&store, &StartRequest::new(3))
        .await
        .unwrap();

    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(api.count_calls(is_abort), 1);
    assert!(api.calls().contains(&ApiCall::Abort(SessionId::new(50))));
    let engine = store.borrow();
    assert_eq!(engine.phase(), Phase::Active);
    assert_ne!(engine.session().unwrap().id, SessionId::new(50));
}

#[tokio::test]
async fn conflicting_session_with_answers_is_offered_for_resume() {
    let api = InMemoryApi::new(demo_questions());
    api.seed_active(open_session(8, &[1]));
    let store = engine();

    let outcome = service(&api)
        .start(&store, &StartRequest::new(3))
        .await
        .unwrap();

    assert_eq!(outcome, StartOutcome::ResumeCandidate);
    assert_eq!(api.count_calls(is_abort), 0);

    let mut engine = store.borrow_mut();
    assert_eq!(engine.phase(), Phase::Prep);
    assert!(engine.accept_resume_candidate());
    assert_eq!(engine.phase(), Phase::Active);
    assert_eq!(engine.current_index(), 1);
    assert!(engine.progress_for(QuestionId::new(1)).is_some());
}

#[tokio::test]
async fn recurring_conflicts_stop_after_bounded_attempts() {
    let api = InMemoryApi::new(demo_questions());
    api.script_start_conflicts([open_session(70, &[]), open_session(71, &[]), open_session(72, &[])]);
    let store = engine();

    let err = service(&api)
        .start(&store, &StartRequest::new(3))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::StartStuck { attempts: 3 }));
    assert_eq!(api.count_calls(is_abort), 2);
    let engine = store.borrow();
    assert_eq!(engine.phase(), Phase::Prep);
    assert!(!engine.is_busy());
    assert!(matches!(engine.notice(), Some(Notice::Transport(_))));
}

#[tokio::test]
async fn same_conflict_twice_is_not_discarded_again() {
    let api = InMemoryApi::new(demo_questions());
    api.script_start_conflicts([open_session(70, &[]), open_session(70, &[])]);
    let store = engine();

    let err = service(&api)
        .start(&store, &StartRequest::new(3))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::StartStuck { attempts: 2 }));
    assert_eq!(api.count_calls(is_abort), 1);
}

#[tokio::test]
async fn reassignment_prunes_progress_and_explanations() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;
    let loop_service = service(&api);

    let recorded = loop_service
        .submit(&store, QuestionId::new(1), AnswerValue::new("B"), Some(12))
        .await
        .unwrap();
    assert!(matches!(recorded, SubmitOutcome::Recorded(ref entry) if entry.is_correct));
    loop_service
        .explanation(&store, QuestionId::new(1))
        .await
        .unwrap();

    let replacement: Vec<_> = demo_questions().into_iter().skip(1).take(3).collect();
    api.reassign_on_next_submit(replacement);
    let outcome = loop_service
        .submit(&store, QuestionId::new(2), AnswerValue::new("B"), None)
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Reassigned);

    let engine = store.borrow();
    let assigned = engine.session().unwrap().question_ids();
    assert!(!assigned.contains(&QuestionId::new(1)));
    assert!(engine
        .progress_keys()
        .all(|key| assigned.contains(&key.question_id)));
    assert!(engine.explanation_for(QuestionId::new(1)).is_none());
    assert!(engine.current_index() < engine.question_count());
    assert_eq!(engine.notice(), Some(&Notice::Reassigned));
}

#[tokio::test]
async fn unavailable_question_drops_session() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;
    api.retire_question(QuestionId::new(1), "withdrawn");

    let outcome = service(&api)
        .submit(&store, QuestionId::new(1), AnswerValue::new("A"), None)
        .await
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::SessionDropped);
    let engine = store.borrow();
    assert_eq!(engine.phase(), Phase::Prep);
    assert!(engine.session().is_none());
    assert_eq!(
        engine.notice(),
        Some(&Notice::QuestionUnavailable(Some("withdrawn".into())))
    );
}

#[tokio::test]
async fn exhausted_quota_keeps_session_running() {
    let api = InMemoryApi::new(demo_questions()).with_quota(1);
    let store = started(&api, 3).await;
    let loop_service = service(&api);

    let first = loop_service
        .explanation(&store, QuestionId::new(1))
        .await
        .unwrap();
    assert!(matches!(first, ExplanationOutcome::Ready(_)));

    let second = loop_service
        .explanation(&store, QuestionId::new(2))
        .await
        .unwrap();
    assert!(matches!(second, ExplanationOutcome::QuotaExceeded(quota) if quota.remaining == 0));

    let engine = store.borrow();
    assert_eq!(engine.phase(), Phase::Active);
    assert_eq!(engine.quota().map(|quota| quota.remaining), Some(0));
}

#[tokio::test]
async fn explanation_is_fetched_once_per_question() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;
    let loop_service = service(&api);

    for _ in 0..3 {
        loop_service
            .explanation(&store, QuestionId::new(2))
            .await
            .unwrap();
    }

    let fetches = api.count_calls(|call| matches!(call, ApiCall::Explanation { .. }));
    assert_eq!(fetches, 1);
}

#[tokio::test]
async fn transport_failure_leaves_progress_untouched() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;
    api.fail_next(StatusCode::INTERNAL_SERVER_ERROR);

    let err = service(&api)
        .submit(&store, QuestionId::new(1), AnswerValue::new("B"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Api(_)));
    let engine = store.borrow();
    assert_eq!(engine.phase(), Phase::Active);
    assert!(engine.progress_for(QuestionId::new(1)).is_none());
    assert!(!engine.is_busy());
    assert!(matches!(engine.notice(), Some(Notice::Transport(_))));
}

#[tokio::test]
async fn task_bound_finish_refetches_next_session() {
    let api = InMemoryApi::new(demo_questions());
    let store = engine();
    service(&api)
        .start(&store, &StartRequest::new(2).with_source("assignment-7"))
        .await
        .unwrap();

    service(&api).finish(&store).await.unwrap();

    let calls = api.calls();
    let end = calls
        .iter()
        .position(|call| matches!(call, ApiCall::End(_)))
        .unwrap();
    assert_eq!(calls.get(end + 1), Some(&ApiCall::ActiveSession));
    assert_eq!(store.borrow().phase(), Phase::Prep);
}

#[tokio::test]
async fn abort_is_local_first_and_tells_server() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;
    let session_id = store.borrow().session().unwrap().id;

    service(&api).abort(&store).await;

    assert!(store.borrow().session().is_none());
    assert!(api.calls().contains(&ApiCall::Abort(session_id)));
    assert_eq!(api.active_id(), None);
}

#[tokio::test]
async fn late_submit_response_after_abort_is_stale() {
    let api = InMemoryApi::new(demo_questions());
    let store = started(&api, 3).await;

    let pending = store
        .borrow_mut()
        .begin_submit(QuestionId::new(1), AnswerValue::new("B"), None)
        .unwrap();
    let duplicate = store
        .borrow_mut()
        .begin_submit(QuestionId::new(1), AnswerValue::new("B"), None);
    assert!(matches!(duplicate, Err(SessionError::Busy)));

    store.borrow_mut().abort();
    let late = store.borrow_mut().apply_submit(
        pending,
        Ok(services::api::SubmitResult {
            is_correct: true,
            log_id: None,
        }),
    );

    assert!(matches!(late, Err(SessionError::Stale)));
    assert!(store.borrow().progress_for(QuestionId::new(1)).is_none());
}
