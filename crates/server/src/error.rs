use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use citequotes_agent::AssistError;
use citequotes_core::captcha::CaptchaError;
use citequotes_core::errors::DomainError;
use citequotes_core::import::ImportError;
use citequotes_db::repositories::RepositoryError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Store failures are logged in full and reported generically.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(detail) | Self::Upstream(detail) => {
                error!(event_name = "http.request.failed", status = status.as_u16(), error = %detail, "request failed");
            }
            other => {
                warn!(event_name = "http.request.denied", status = status.as_u16(), error = %other, "request denied");
            }
        }
        (status, Json(ErrorBody { error: self.public_message() })).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(message) => Self::BadRequest(message),
            DomainError::InsufficientPrivilege { .. } => Self::Forbidden(error.to_string()),
            DomainError::NotFound { .. } => Self::NotFound(error.to_string()),
            DomainError::InvalidSubmissionTransition { .. } => Self::Conflict(error.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { .. } => Self::NotFound(error.to_string()),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Validation(message) => Self::BadRequest(message),
            RepositoryError::Database(_) | RepositoryError::Decode(_) => {
                Self::Internal(error.to_string())
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(error: ImportError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<CaptchaError> for ApiError {
    fn from(error: CaptchaError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<AssistError> for ApiError {
    fn from(error: AssistError) -> Self {
        match error {
            AssistError::Rejected { message, .. } => Self::BadRequest(message),
            AssistError::Llm(source) => Self::Upstream(format!("language model request failed: {source:#}")),
            AssistError::Malformed(detail) => {
                Self::Upstream(format!("language model returned malformed output: {detail}"))
            }
        }
    }
}

/// `Json` that reports body errors through [`ApiError`] so every failure has an `{error}` body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection_message(rejection))),
        }
    }
}

fn rejection_message(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "expected `Content-Type: application/json`".to_string()
        }
        other => other.body_text(),
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
