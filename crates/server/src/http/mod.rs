//! HTTP surface: routing, shared state and the session gate.
//!
//! ```text
//! /health                      public
//! /register /login /logout     public
//! /api/files/...               session required
//! /api/settings/...            session required
//! ```

mod auth;
mod error;
mod files;
mod settings;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::COOKIE;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use engine::{ArchiveBuilder, FileOperationEngine};

use crate::auth::{session_token, SessionStore};
use crate::settings::SettingsStore;

pub use error::{ApiError, ApiResult};

/// Slack on top of the per-file limit for multipart framing and form fields.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FileOperationEngine>,
    pub archives: Arc<ArchiveBuilder>,
    pub settings: Arc<SettingsStore>,
    pub sessions: Arc<SessionStore>,
    /// Request body limit for uploads.
    pub upload_body_limit: usize,
}

impl AppState {
    /// Bundle the services. The upload body limit is derived from the
    /// per-file limit.
    pub fn new(
        engine: Arc<FileOperationEngine>,
        archives: Arc<ArchiveBuilder>,
        settings: Arc<SettingsStore>,
        sessions: Arc<SessionStore>,
        max_upload_size: u64,
    ) -> Self {
        let limit = max_upload_size.saturating_mul(4).saturating_add(MULTIPART_OVERHEAD);
        Self {
            engine,
            archives,
            settings,
            sessions,
            upload_body_limit: usize::try_from(limit).unwrap_or(usize::MAX),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let files = Router::new()
        .route("/", get(files::list))
        .route("/preview", get(files::preview))
        .route(
            "/upload",
            post(files::upload).layer(DefaultBodyLimit::max(state.upload_body_limit)),
        )
        .route("/delete", post(files::delete))
        .route("/check_duplicates", post(files::check_duplicates))
        .route("/paste", post(files::paste))
        .route("/download", get(files::download))
        .route("/download_multiple", post(files::download_multiple));

    let settings = Router::new()
        .route("/", get(settings::show))
        .route("/check_directory_access", post(settings::check_directory_access))
        .route("/update_root_path", post(settings::update_root_path))
        .route("/restore_default_path", post(settings::restore_default_path))
        .route("/update_password", post(settings::update_password));

    let api = Router::new()
        .nest("/files", files)
        .nest("/settings", settings)
        .route("/session", get(auth::whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(auth::health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .nest("/api", api)
        .with_state(state)
}

/// Authenticated user name, inserted by the session gate.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Reject requests without a live session cookie.
async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_token)
        .map(str::to_string);

    let Some(username) = token.and_then(|t| state.sessions.validate(&t)) else {
        tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return Err(ApiError::Unauthorized);
    };

    request.extensions_mut().insert(CurrentUser(username));
    Ok(next.run(request).await)
}

/// Run blocking engine work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
