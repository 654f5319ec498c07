mod activity_vm;
mod capture_vm;
mod engine_store;
mod narration_vm;
mod question_vm;
mod session_vm;
mod time_fmt;

pub use activity_vm::{ActivityRowVm, ActivityVm, LogLineVm, map_activity};
pub use capture_vm::{
    HandleVm, SelectionOverlayVm, capture_target, map_overlay, target_label, zoom_label,
};
pub use engine_store::EngineSignal;
pub use narration_vm::{NarrationVm, map_narration};
pub use question_vm::{
    AnswerStatusVm, ChoiceVm, FigureVm, FreeResponseVm, QuestionVm, RunVm, map_question,
    map_runs, run_class,
};
pub use session_vm::{
    QUESTION_COUNTS, ResumeCandidateVm, SECTIONS, SessionFooterVm, busy_label, can_start,
    map_resume_candidate, map_session_footer,
};
pub use time_fmt::format_elapsed;
