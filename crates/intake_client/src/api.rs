use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use intake_core::ErrorKind;

use crate::types::{
    AskRequest, AskResponse, CaseRecord, ChatRecord, DocumentRecord, DocumentStatus, ErrorDetail,
    NewCase,
};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Failure of one backend request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    RateLimited(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error {status}: {detail}")]
    Server { status: u16, detail: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Projects onto the core error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(message) => ErrorKind::Network(message.clone()),
            ApiError::Timeout => ErrorKind::Timeout,
            ApiError::RateLimited(message) => ErrorKind::RateLimited(message.clone()),
            ApiError::NotFound(message) => ErrorKind::NotFound(message.clone()),
            ApiError::Server { status, detail } => ErrorKind::Server {
                status: *status,
                detail: detail.clone(),
            },
            // A body we cannot decode is retried like any transport fault.
            ApiError::Decode(message) => ErrorKind::Network(message.clone()),
        }
    }
}

/// The HTTP contract consumed from the intake backend.
///
/// One implementation per transport; drivers and tests depend on this seam,
/// never on `reqwest` directly.
#[async_trait::async_trait]
pub trait BackendApi: Send + Sync {
    async fn document_status(&self, document_id: &str) -> Result<DocumentStatus, ApiError>;
    async fn ask(&self, case_id: &str, question: &str) -> Result<AskResponse, ApiError>;
    async fn chat_history(&self, case_id: &str) -> Result<Vec<ChatRecord>, ApiError>;
    async fn clear_history(&self, case_id: &str) -> Result<(), ApiError>;
    async fn list_cases(&self) -> Result<Vec<CaseRecord>, ApiError>;
    async fn create_case(&self, new_case: &NewCase) -> Result<CaseRecord, ApiError>;
    async fn documents_for_case(&self, case_id: &str) -> Result<Vec<DocumentRecord>, ApiError>;
    async fn get_document(&self, document_id: &str) -> Result<DocumentRecord, ApiError>;
    async fn delete_document(&self, document_id: &str) -> Result<(), ApiError>;
}

/// Production `BackendApi` over a shared `reqwest` client.
///
/// The client carries no cross-request state; every subscription and session
/// may hold its own clone of this handle.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestBackend {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(check_status(response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(check_status(response).await?).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackendApi for ReqwestBackend {
    async fn document_status(&self, document_id: &str) -> Result<DocumentStatus, ApiError> {
        self.get_json(&format!("/api/documents/{document_id}/status"))
            .await
    }

    async fn ask(&self, case_id: &str, question: &str) -> Result<AskResponse, ApiError> {
        let body = AskRequest {
            case_id: case_id.to_string(),
            question: question.to_string(),
        };
        self.post_json("/api/chat/ask", &body).await
    }

    async fn chat_history(&self, case_id: &str) -> Result<Vec<ChatRecord>, ApiError> {
        self.get_json(&format!("/api/chat/history/{case_id}")).await
    }

    async fn clear_history(&self, case_id: &str) -> Result<(), ApiError> {
        self.post_empty(&format!("/api/chat/clear/{case_id}")).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, ApiError> {
        self.get_json("/api/cases").await
    }

    async fn create_case(&self, new_case: &NewCase) -> Result<CaseRecord, ApiError> {
        self.post_json("/api/cases", new_case).await
    }

    async fn documents_for_case(&self, case_id: &str) -> Result<Vec<DocumentRecord>, ApiError> {
        self.get_json(&format!("/api/documents/case/{case_id}"))
            .await
    }

    async fn get_document(&self, document_id: &str) -> Result<DocumentRecord, ApiError> {
        self.get_json(&format!("/api/documents/{document_id}")).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/documents/{document_id}")).await
    }
}

/// Marker carried by rate-limit rejections regardless of status code.
fn is_rate_limit_detail(detail: &str) -> bool {
    detail.contains("Rate limit") || detail.contains("limit exceeded")
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // The backend uses a structured `detail` field; fall back to the status
    // line when the body is not parseable.
    let detail = match response.text().await {
        Ok(body) => serde_json::from_str::<ErrorDetail>(&body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                }
            }),
        Err(_) => status.to_string(),
    };

    if status.as_u16() == 429 || is_rate_limit_detail(&detail) {
        return Err(ApiError::RateLimited(detail));
    }
    if status.as_u16() == 404 {
        return Err(ApiError::NotFound(detail));
    }
    Err(ApiError::Server {
        status: status.as_u16(),
        detail,
    })
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}
