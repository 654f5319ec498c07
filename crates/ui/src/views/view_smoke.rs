use prep_core::model::{QuestionId, Session, SessionId, SessionType};
use services::InMemoryApi;
use services::api::demo_questions;
use services::sessions::Phase;

use super::practice::PracticeIntent;
use super::test_harness::{ViewKind, setup_view_harness};

fn seeded_api() -> InMemoryApi {
    let api = InMemoryApi::demo();
    api.seed_active(Session {
        id: SessionId::new(40),
        session_type: SessionType::Standard,
        questions: demo_questions(),
        progress: Vec::new(),
        source_id: None,
        started_at: None,
    });
    api
}

#[tokio::test(flavor = "current_thread")]
async fn practice_view_smoke_renders_prep_form() {
    let mut harness = setup_view_harness(ViewKind::Practice, InMemoryApi::demo());
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Start session"), "missing start button in {html}");
    assert!(html.contains("All sections"), "missing section picker in {html}");
    assert_eq!(harness.read_engine(|engine| engine.phase()), Phase::Prep);
}

#[tokio::test(flavor = "current_thread")]
async fn practice_view_smoke_resumes_open_session() {
    let mut harness = setup_view_harness(ViewKind::Practice, seeded_api());
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("what is the value of x?"), "missing stem in {html}");
    assert!(html.contains("Question 1 of 5"), "missing position in {html}");
    assert!(html.contains("0 / 5 answered"), "missing footer in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn practice_view_smoke_records_answer() {
    let mut harness = setup_view_harness(ViewKind::Practice, seeded_api());
    harness.rebuild();
    harness.settle().await;

    harness.dispatch(PracticeIntent::Select("B".to_string()));
    harness.dispatch(PracticeIntent::Submit);
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("1 / 5 answered"), "missing progress in {html}");
    assert!(html.contains("Correct"), "missing verdict in {html}");
    assert!(harness.read_engine(|engine| engine.progress_for(QuestionId::new(1)).is_some()));
}

#[tokio::test(flavor = "current_thread")]
async fn practice_view_smoke_plays_explanation() {
    let mut harness = setup_view_harness(ViewKind::Practice, seeded_api());
    harness.rebuild();
    harness.settle().await;

    harness.dispatch(PracticeIntent::Explain);
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("narration__step"), "missing narration panel in {html}");
    assert!(html.contains("Explanations left: 19"), "missing quota in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn practice_view_smoke_abort_returns_to_prep() {
    let mut harness = setup_view_harness(ViewKind::Practice, seeded_api());
    harness.rebuild();
    harness.settle().await;

    harness.dispatch(PracticeIntent::Abort);
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Start session"), "missing prep form in {html}");
    assert_eq!(harness.api.active_id(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn capture_view_smoke_loads_page() {
    let mut harness = setup_view_harness(ViewKind::Capture("question", 3), InMemoryApi::demo());
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Question 3"), "missing heading in {html}");
    assert!(html.contains("region__stage"), "missing selector in {html}");
    assert!(html.contains("100%"), "missing zoom label in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn capture_view_smoke_rejects_unknown_target() {
    let mut harness = setup_view_harness(ViewKind::Capture("lesson", 3), InMemoryApi::demo());
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(
        html.contains("Pick a question or draft before capturing a figure."),
        "missing error in {html}"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn activity_view_smoke_reports_offline() {
    let mut harness = setup_view_harness(ViewKind::Activity, InMemoryApi::demo());
    harness.rebuild();

    let html = harness.render();
    assert!(html.contains("working offline"), "missing offline note in {html}");
}
