//! Shared error types for the services crate.

use serde::Deserialize;
use thiserror::Error;

use prep_core::model::{QuestionId, Quota, Session};
use prep_core::region::RegionError;

/// Body of a 409 response, discriminated by its `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Starting a session clashed with one that is still open.
    ActiveSession { session: Box<Session> },
    /// The server rewrote the assigned question list.
    Reassigned { session: Box<Session> },
    /// The question can no longer be answered.
    Unavailable {
        #[serde(default)]
        question_id: Option<QuestionId>,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActiveSession { session } => {
                write!(f, "session {} is already active", session.id)
            }
            Self::Reassigned { session } => {
                write!(f, "session {} was reassigned", session.id)
            }
            Self::Unavailable { reason, .. } => match reason {
                Some(reason) => write!(f, "question unavailable: {reason}"),
                None => f.write_str("question unavailable"),
            },
        }
    }
}

/// Errors raised while reading `ApiConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    #[error("{key} must use http(s) or ws(s), got {scheme:?}")]
    UnsupportedScheme { key: &'static str, scheme: String },
}

/// Errors emitted by `PracticeApi` / `FigureApi` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("conflict: {0}")]
    Conflict(ConflictKind),
    #[error("explanation quota exceeded ({} of {} used)", .0.used, .0.limit)]
    QuotaExceeded(Quota),
    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors emitted by the session engine and practice workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("another request is still in flight")]
    Busy,
    #[error("response belongs to a session that is no longer current")]
    Stale,
    #[error("no active session")]
    NoSession,
    #[error("question {0} is not part of the session")]
    UnknownQuestion(QuestionId),
    #[error("question {id} cannot be answered: {reason}")]
    Unavailable { id: QuestionId, reason: String },
    #[error("question index {index} is out of range ({len} questions)")]
    OutOfRange { index: usize, len: usize },
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("could not start a session after {attempts} attempts")]
    StartStuck { attempts: u32 },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Domain(#[from] prep_core::Error),
}

/// Errors emitted by the push channel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PushError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed push frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors emitted by `FigureCaptureService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FigureError {
    #[error("no question or draft is bound to this capture")]
    NoTarget,
    #[error("selection does not fit inside the {width}x{height} page")]
    SelectionOutOfBounds { width: u32, height: u32 },
    #[error("page image is {actual_width}x{actual_height}, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
