//! Registration, login, logout and health.

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use super::{blocking, ApiResult, AppState, CurrentUser};
use crate::auth::{clear_session_cookie, session_cookie, session_token};

#[derive(Debug, Deserialize)]
pub(super) struct CredentialsRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `GET /health`
pub(super) async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /register`: create the admin account while none exists.
pub(super) async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let settings = state.settings.clone();
    let username = request.username.clone();
    blocking(move || Ok(settings.register(&request.username, &request.password)?)).await?;

    tracing::info!(user = %username, "Admin account registered");
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok" }))))
}

/// `POST /login`: issue a session cookie.
pub(super) async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let settings = state.settings.clone();
    let username = request.username.trim().to_string();
    blocking(move || Ok(settings.verify_login(&request.username, &request.password)?)).await?;

    let token = state.sessions.create(&username);
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie(&token, state.sessions.ttl())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid cookie header: {e}"))?,
    );

    Ok((headers, Json(json!({ "status": "ok", "username": username }))))
}

/// `POST /logout`: drop the session and clear the cookie.
pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_token);
    if let Some(token) = token {
        state.sessions.revoke(token);
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        clear_session_cookie()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid cookie header: {e}"))?,
    );
    Ok((response_headers, Json(json!({ "status": "ok" }))))
}

/// `GET /api/session`: who is signed in.
pub(super) async fn whoami(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({ "username": user.0 }))
}
