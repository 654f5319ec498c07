use services::SessionEngine;
use services::sessions::{Phase, RequestKind};

use super::time_fmt::format_elapsed;

/// Sections offered on the prep screen: (value sent to the server, label).
pub const SECTIONS: [(&str, &str); 3] = [("", "All sections"), ("math", "Math"), ("reading", "Reading")];
pub const QUESTION_COUNTS: [u32; 3] = [5, 10, 20];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFooterVm {
    pub progress_label: String,
    pub score_label: String,
    pub elapsed_label: String,
    pub quota_label: Option<String>,
    pub busy_label: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeCandidateVm {
    pub answered_label: String,
}

#[must_use]
pub fn busy_label(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Start => "Starting session...",
        RequestKind::ResumeActive => "Looking for an open session...",
        RequestKind::Submit => "Submitting...",
        RequestKind::Explanation => "Preparing explanation...",
    }
}

#[must_use]
pub fn map_session_footer(engine: &SessionEngine) -> SessionFooterVm {
    let score = engine.score();
    SessionFooterVm {
        progress_label: format!("{} / {} answered", score.answered, score.total),
        score_label: format!("{} correct", score.correct),
        elapsed_label: format!("Time: {}", format_elapsed(engine.elapsed_on_current())),
        quota_label: engine
            .quota()
            .filter(|quota| quota.limit > 0)
            .map(|quota| format!("Explanations left: {}", quota.remaining)),
        busy_label: engine.in_flight().map(busy_label),
    }
}

#[must_use]
pub fn map_resume_candidate(engine: &SessionEngine) -> Option<ResumeCandidateVm> {
    engine.resume_candidate().map(|session| ResumeCandidateVm {
        answered_label: format!(
            "{} of {} questions answered",
            session.progress.len(),
            session.questions.len()
        ),
    })
}

/// Whether the prep form should accept input.
#[must_use]
pub fn can_start(engine: &SessionEngine) -> bool {
    engine.phase() == Phase::Prep && !engine.is_busy()
}
