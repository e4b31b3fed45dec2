//! Settings endpoints: root directory management and password change.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{blocking, ApiResult, AppState};
use crate::auth::MIN_PASSWORD_LEN;
use crate::settings::{RootSettings, SettingsError};

#[derive(Debug, Deserialize)]
pub(super) struct PathRequest {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PasswordRequest {
    #[serde(default)]
    password: String,
}

fn success(message: impl Into<String>, extra: serde_json::Value) -> Response {
    let mut body = json!({ "success": true, "message": message.into() });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(message: impl Into<String>) -> Response {
    let message = message.into();
    tracing::warn!(message = %message, "Settings change rejected");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

fn required_path(raw: &str) -> Result<PathBuf, Response> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(failure("path must not be empty"));
    }
    Ok(PathBuf::from(trimmed))
}

/// `GET /api/settings`
pub(super) async fn show(State(state): State<AppState>) -> ApiResult<Json<RootSettings>> {
    let settings = state.settings.clone();
    let current = blocking(move || Ok(settings.root_settings()?)).await?;
    Ok(Json(current))
}

/// `POST /api/settings/check_directory_access` `{path}`
pub(super) async fn check_directory_access(
    State(state): State<AppState>,
    Json(request): Json<PathRequest>,
) -> ApiResult<Response> {
    let path = match required_path(&request.path) {
        Ok(path) => path,
        Err(response) => return Ok(response),
    };

    let settings = state.settings.clone();
    let access = blocking(move || Ok(settings.check_directory_access(&path))).await?;

    if access.is_ok() {
        Ok(success(access.message(), json!({})))
    } else {
        Ok(failure(access.message()))
    }
}

/// `POST /api/settings/update_root_path` `{path}`
pub(super) async fn update_root_path(
    State(state): State<AppState>,
    Json(request): Json<PathRequest>,
) -> ApiResult<Response> {
    let path = match required_path(&request.path) {
        Ok(path) => path,
        Err(response) => return Ok(response),
    };

    let settings = state.settings.clone();
    let result = blocking(move || Ok(settings.update_root_path(path))).await?;

    Ok(match result {
        Ok(path) => success(
            "root directory updated",
            json!({ "root_path": path }),
        ),
        Err(e) => failure(e.to_string()),
    })
}

/// `POST /api/settings/restore_default_path`
pub(super) async fn restore_default_path(State(state): State<AppState>) -> ApiResult<Response> {
    let settings = state.settings.clone();
    let result = blocking(move || Ok(settings.restore_default_path())).await?;

    Ok(match result {
        Ok(path) => success(
            "default root directory restored",
            json!({ "root_path": path }),
        ),
        Err(e) => failure(e.to_string()),
    })
}

/// `POST /api/settings/update_password` `{password}`
///
/// Every session, including the caller's, is ended on success.
pub(super) async fn update_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordRequest>,
) -> ApiResult<Response> {
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Ok(failure(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let settings = state.settings.clone();
    let result: Result<(), SettingsError> =
        blocking(move || Ok(settings.update_password(&request.password))).await?;

    Ok(match result {
        Ok(()) => {
            state.sessions.revoke_all();
            success("password updated, please sign in again", json!({}))
        }
        Err(e) => failure(e.to_string()),
    })
}
