//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::EngineError;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::settings::SettingsError;

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::InvalidPath(_) | EngineError::BadRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Conflict(_) => StatusCode::CONFLICT,
                EngineError::Io(_) | EngineError::LockPoisoned { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {err}"))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge(err.body_text());
        }
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Engine(e) => ApiError::Engine(e),
            SettingsError::Auth(AuthError::InvalidCredentials) => ApiError::Unauthorized,
            SettingsError::Auth(AuthError::AlreadyRegistered) => {
                ApiError::Forbidden(AuthError::AlreadyRegistered.to_string())
            }
            SettingsError::Auth(e) => ApiError::BadRequest(e.to_string()),
            SettingsError::Access(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = match &self {
            ApiError::Engine(EngineError::Conflict(names)) => json!({
                "error": self.to_string(),
                "duplicate_files": names,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
