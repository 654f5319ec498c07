#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod figures;
pub mod narration;
pub mod push;
pub mod sessions;

pub use prep_core::Clock;

pub use api::{FigureApi, HttpApi, InMemoryApi, PracticeApi, StartRequest};
pub use config::ApiConfig;
pub use error::{ApiError, ConfigError, ConflictKind, FigureError, PushError, SessionError};
pub use figures::{CroppedFigure, FigureCaptureService, LoadedSource};
pub use narration::{NarrationFrame, NarrationPlayer};
pub use push::{PushChannel, PushFeed, PushMessage};
pub use sessions::{EngineStore, PracticeLoopService, SessionEngine, StartOutcome};
