mod engine;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{
    ConflictResolution, ExplanationLookup, ExplanationOutcome, FinishedSession, MAX_START_ATTEMPTS,
    Notice, Phase, RequestKind, SessionEngine, StartApplied, StartAttempts, SubmitOutcome,
    SubmitTicket, Ticket,
};
pub use workflow::{EngineStore, PracticeLoopService, StartOutcome};
