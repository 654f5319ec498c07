use async_trait::async_trait;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use prep_core::model::{CaptureTarget, FigureSource, QuestionId, Quota, Session, SessionId};

use super::{
    ExplanationResponse, FigureApi, FigureUpload, PracticeApi, StartRequest, SubmitRequest,
    SubmitResult, UploadedFigure,
};
use crate::config::ApiConfig;
use crate::error::{ApiError, ConflictKind};

/// `PracticeApi` and `FigureApi` over JSON/HTTP with bearer auth.
///
/// Every request carries `Accept-Language` so explanations come back in the
/// configured language.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    config: ApiConfig,
}

impl HttpApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.config.endpoint(path)?;
        debug!(method = "GET", %url, "api request");
        Ok(self.authorize(self.client.get(url)))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.config.endpoint(path)?;
        debug!(method = "POST", %url, "api request");
        Ok(self.authorize(self.client.post(url)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let language = self.config.language();
        let request = if language.is_empty() {
            request
        } else {
            request.header(ACCEPT_LANGUAGE, language)
        };
        match self.config.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl PracticeApi for HttpApi {
    async fn start_session(&self, request: &StartRequest) -> Result<Session, ApiError> {
        let response = self.post("sessions")?.json(request).send().await?;
        decode(response).await
    }

    async fn active_session(&self) -> Result<Option<Session>, ApiError> {
        let response = self.get("sessions/active")?.send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode(response).await
    }

    async fn submit_answer(
        &self,
        session_id: SessionId,
        request: &SubmitRequest,
    ) -> Result<SubmitResult, ApiError> {
        let path = format!("sessions/{session_id}/answers");
        let response = self.post(&path)?.json(request).send().await?;
        decode(response).await
    }

    async fn fetch_explanation(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<ExplanationResponse, ApiError> {
        let path = format!("sessions/{session_id}/questions/{question_id}/explanation");
        let response = self.get(&path)?.send().await?;
        decode(response).await
    }

    async fn abort_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        let path = format!("sessions/{session_id}/abort");
        let response = self.post(&path)?.send().await?;
        expect_success(response).await
    }

    async fn end_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        let path = format!("sessions/{session_id}/end");
        let response = self.post(&path)?.send().await?;
        expect_success(response).await
    }
}

#[async_trait]
impl FigureApi for HttpApi {
    async fn fetch_page_source(
        &self,
        target: CaptureTarget,
        page: Option<u32>,
    ) -> Result<FigureSource, ApiError> {
        let path = format!("figures/{}/source", target.path_segment());
        let mut request = self.get(&path)?;
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        decode(request.send().await?).await
    }

    async fn upload_figure(
        &self,
        target: CaptureTarget,
        upload: &FigureUpload,
    ) -> Result<UploadedFigure, ApiError> {
        let path = format!("figures/{}", target.path_segment());
        let response = self.post(&path)?.json(upload).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;
    if let Some(err) = error_for_status(status, &body) {
        return Err(err);
    }
    Ok(serde_json::from_slice(&body)?)
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    let body = response.bytes().await?;
    match error_for_status(status, &body) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Deserialize)]
struct QuotaBody {
    #[serde(default)]
    quota: Quota,
}

/// Map a non-success response onto the error taxonomy.
fn error_for_status(status: StatusCode, body: &[u8]) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }
    let err = match status {
        StatusCode::CONFLICT => match serde_json::from_slice::<ConflictKind>(body) {
            Ok(kind) => ApiError::Conflict(kind),
            Err(_) => ApiError::Status(status),
        },
        StatusCode::TOO_MANY_REQUESTS => {
            let quota = serde_json::from_slice::<QuotaBody>(body)
                .map(|body| body.quota)
                .unwrap_or_default();
            ApiError::QuotaExceeded(quota)
        }
        StatusCode::NOT_FOUND => ApiError::NotFound,
        other => ApiError::Status(other),
    };
    Some(err)
}
