mod explanation;
mod figure;
mod ids;
mod question;
mod session;

pub use explanation::{
    DirectiveAction, DirectiveTarget, Explanation, ExplanationStep, Narration, Quota,
    StepDirective,
};
pub use figure::{FigureBBox, FigureSource, ImageSize, SelectionRect};
pub use ids::{
    CaptureTarget, DraftId, JobId, LogId, ParseIdError, ProgressKey, QuestionId, SessionId,
};
pub use question::{
    AnswerFormat, AnswerValue, AssignedQuestion, Choice, Figure, FreeResponseKind,
    FreeResponseSchema, UnavailableReason,
};
pub use session::{ProgressEntry, Session, SessionScore, SessionType};
