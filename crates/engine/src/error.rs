//! Error types for the engine crate.

use thiserror::Error;

/// Engine error type covering the request-level failure modes.
///
/// Per-item failures inside a batch (upload, delete, paste) are never
/// returned through this type; they land in the batch outcome's `failed`
/// bucket instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Logical path escapes the root or is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// File or directory does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision that needs an explicit policy from the client.
    #[error("conflict: {} existing name(s): {}", .0.len(), .0.join(", "))]
    Conflict(Vec<String>),

    /// Permission, disk or transient OS failure.
    #[error("I/O failure: {0}")]
    Io(std::io::Error),

    /// Missing or empty required input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The root configuration lock was poisoned.
    #[error("lock poisoned: {context}")]
    LockPoisoned {
        /// Which lock acquisition failed.
        context: String,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => EngineError::NotFound(err.to_string()),
            _ => EngineError::Io(err),
        }
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => io.into(),
            other => EngineError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

impl From<walkdir::Error> for EngineError {
    fn from(err: walkdir::Error) -> Self {
        let message = err.to_string();
        match err.into_io_error() {
            Some(io) => io.into(),
            None => EngineError::Io(std::io::Error::other(message)),
        }
    }
}
