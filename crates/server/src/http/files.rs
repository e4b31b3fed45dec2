//! File endpoints: list, preview, upload, delete, duplicate check, paste
//! and downloads.

use std::collections::BTreeSet;

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::{
    ConflictPolicy, DeleteOutcome, DirectoryEntry, Download, EngineError, FileReference,
    IncomingFile, PasteOperation, PasteOutcome, Preview, UploadOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{blocking, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct PathQuery {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PathsRequest {
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckDuplicatesRequest {
    #[serde(default)]
    target_path: String,
    #[serde(default)]
    files: Vec<FileReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasteRequest {
    #[serde(default)]
    target_path: String,
    #[serde(default)]
    files: Vec<FileReference>,
    #[serde(default)]
    operation: String,
    #[serde(default)]
    file_action: Option<String>,
}

/// Batch outcome plus a summary line.
#[derive(Debug, Serialize)]
struct BatchResponse<T: Serialize> {
    message: String,
    #[serde(flatten)]
    outcome: T,
}

/// 200 when every item succeeded or was skipped, 206 otherwise.
fn batch_response<T: Serialize>(message: String, partial: bool, outcome: T) -> Response {
    let status = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    (status, Json(BatchResponse { message, outcome })).into_response()
}

fn conflict(duplicates: BTreeSet<String>) -> ApiError {
    EngineError::Conflict(duplicates.into_iter().collect()).into()
}

/// Browsers send a relative path for folder uploads; keep the last segment.
fn client_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).to_string()
}

/// `GET /api/files?path=`
pub(super) async fn list(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Vec<DirectoryEntry>>> {
    let engine = state.engine.clone();
    let entries = blocking(move || Ok(engine.list(&query.path)?)).await?;
    Ok(Json(entries))
}

/// `GET /api/files/preview?path=`
pub(super) async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Preview>> {
    let engine = state.engine.clone();
    let preview = blocking(move || Ok(engine.preview(&query.path)?)).await?;
    Ok(Json(preview))
}

/// `POST /api/files/upload` (multipart: `path`, `fileAction`, `files`)
pub(super) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut target = String::new();
    let mut file_action = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "path" => target = field.text().await?,
            "fileAction" => file_action = Some(field.text().await?),
            "files" | "files[]" => {
                let name = client_file_name(field.file_name().unwrap_or_default());
                let data = field.bytes().await?;
                debug!(name = %name, size = data.len(), "Received upload part");
                files.push(IncomingFile::new(name, data.to_vec()));
            }
            other => debug!(field = %other, "Ignoring multipart field"),
        }
    }

    let policy = ConflictPolicy::parse(file_action.as_deref());
    let engine = state.engine.clone();
    let outcome: UploadOutcome =
        blocking(move || Ok(engine.upload(&target, files, policy)?)).await?;

    Ok(batch_response(outcome.message(), outcome.has_failures(), outcome))
}

/// `POST /api/files/delete` `{paths}`
pub(super) async fn delete(
    State(state): State<AppState>,
    Json(request): Json<PathsRequest>,
) -> ApiResult<Response> {
    let engine = state.engine.clone();
    let outcome: DeleteOutcome = blocking(move || Ok(engine.delete(&request.paths)?)).await?;

    Ok(batch_response(outcome.message(), outcome.has_failures(), outcome))
}

/// `POST /api/files/check_duplicates` `{targetPath, files}`
///
/// Answers 409 with the duplicate names, or 200 with an empty list.
pub(super) async fn check_duplicates(
    State(state): State<AppState>,
    Json(request): Json<CheckDuplicatesRequest>,
) -> ApiResult<Response> {
    let engine = state.engine.clone();
    let duplicates = blocking(move || {
        Ok(engine.check_duplicates(&request.target_path, &request.files)?)
    })
    .await?;

    if !duplicates.is_empty() {
        return Err(conflict(duplicates));
    }
    Ok(Json(json!({ "duplicate_files": [] })).into_response())
}

/// `POST /api/files/paste` `{targetPath, files, operation, fileAction?}`
///
/// Without `fileAction` the duplicate check runs first and any collision
/// stops the request with 409 before anything is written.
pub(super) async fn paste(
    State(state): State<AppState>,
    Json(request): Json<PasteRequest>,
) -> ApiResult<Response> {
    if request.operation.trim().is_empty() {
        return Err(ApiError::BadRequest("operation is required".to_string()));
    }
    let operation = PasteOperation::parse(&request.operation);
    let policy = ConflictPolicy::parse(request.file_action.as_deref());
    let engine = state.engine.clone();

    let outcome: PasteOutcome = blocking(move || {
        if policy == ConflictPolicy::Unspecified {
            let duplicates = engine.check_duplicates(&request.target_path, &request.files)?;
            if !duplicates.is_empty() {
                return Err(conflict(duplicates));
            }
        }
        Ok(engine.paste(&request.target_path, &request.files, operation, policy)?)
    })
    .await?;

    Ok(batch_response(outcome.message(), outcome.has_failures(), outcome))
}

/// `GET /api/files/download?path=`: the file itself, or a ZIP for a directory.
pub(super) async fn download(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Response> {
    let archives = state.archives.clone();

    let prepared = blocking(move || match archives.download(&query.path)? {
        Download::File(file) => {
            let handle = std::fs::File::open(&file.path).map_err(EngineError::from)?;
            Ok((handle, file.size, file.mime_type, file.display_name))
        }
        Download::Archive(job) => {
            let content_type = job.content_type().to_string();
            let name = job.display_name().to_string();
            let (handle, size) = job.open_for_send()?;
            Ok((handle, size, content_type, name))
        }
    })
    .await?;

    let (handle, size, content_type, name) = prepared;
    stream_attachment(handle, size, &content_type, &name)
}

/// `POST /api/files/download_multiple` `{paths}`
pub(super) async fn download_multiple(
    State(state): State<AppState>,
    Json(request): Json<PathsRequest>,
) -> ApiResult<Response> {
    let archives = state.archives.clone();

    let (handle, size, content_type, name) = blocking(move || {
        let job = archives.multiple(&request.paths)?;
        let content_type = job.content_type().to_string();
        let name = job.display_name().to_string();
        let (handle, size) = job.open_for_send()?;
        Ok((handle, size, content_type, name))
    })
    .await?;

    stream_attachment(handle, size, &content_type, &name)
}

fn stream_attachment(
    handle: std::fs::File,
    size: u64,
    content_type: &str,
    name: &str,
) -> ApiResult<Response> {
    let stream = ReaderStream::new(tokio::fs::File::from_std(handle));
    let body = Body::from_stream(stream);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(name)),
        ],
        body,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
pub(crate) fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
