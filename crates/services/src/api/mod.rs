//! Server contract for practice sessions and figure capture.

mod demo;
mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prep_core::model::{
    AnswerValue, CaptureTarget, Explanation, FigureBBox, FigureSource, LogId, QuestionId, Quota,
    Session, SessionId,
};

use crate::error::ApiError;

pub use demo::{DEMO_PAGE_HEIGHT, DEMO_PAGE_WIDTH, demo_page_source, demo_questions};
pub use http::HttpApi;
pub use memory::{ApiCall, InMemoryApi};

/// Parameters for a new practice session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl StartRequest {
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self {
            section: None,
            count,
            source_id: None,
        }
    }

    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub question_id: QuestionId,
    pub value: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub is_correct: bool,
    #[serde(default)]
    pub log_id: Option<LogId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationResponse {
    pub explanation: Explanation,
    #[serde(default)]
    pub quota: Option<Quota>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureUpload {
    pub image_base64: String,
    pub bbox: FigureBBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFigure {
    pub id: String,
    pub url: String,
}

/// Practice session endpoints.
#[async_trait]
pub trait PracticeApi: Send + Sync {
    /// Request a new session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict(ConflictKind::ActiveSession)` when another
    /// session is still open.
    async fn start_session(&self, request: &StartRequest) -> Result<Session, ApiError>;

    /// Fetch the caller's open session, if any.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport or decode failures.
    async fn active_session(&self) -> Result<Option<Session>, ApiError>;

    /// Record an answer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` with `Reassigned` or `Unavailable` when
    /// the server no longer accepts answers for this question.
    async fn submit_answer(
        &self,
        session_id: SessionId,
        request: &SubmitRequest,
    ) -> Result<SubmitResult, ApiError>;

    /// Fetch (and possibly generate) the explanation for a question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::QuotaExceeded` when generation allowance ran out.
    async fn fetch_explanation(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<ExplanationResponse, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` for transport failures.
    async fn abort_session(&self, session_id: SessionId) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` for transport failures.
    async fn end_session(&self, session_id: SessionId) -> Result<(), ApiError>;
}

/// Figure source and upload endpoints used by the capture screen.
#[async_trait]
pub trait FigureApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when the target has no source page.
    async fn fetch_page_source(
        &self,
        target: CaptureTarget,
        page: Option<u32>,
    ) -> Result<FigureSource, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` for transport failures.
    async fn upload_figure(
        &self,
        target: CaptureTarget,
        upload: &FigureUpload,
    ) -> Result<UploadedFigure, ApiError>;
}
