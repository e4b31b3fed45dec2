//! Runtime-mutable root directory.
//!
//! Every engine operation reads the root exactly once, through
//! [`RootConfig::resolver`], and works against that snapshot until it
//! finishes. An administrator swapping the root mid-operation only affects
//! operations that start afterwards.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::paths::PathResolver;

/// Outcome of a directory access probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCheck {
    /// Directory exists and accepts writes.
    ReadWrite,
    /// Directory does not exist (or is not a directory).
    Missing,
    /// Creating a probe file was refused.
    PermissionDenied,
    /// Some other I/O failure.
    Failed(String),
}

impl AccessCheck {
    /// Whether the directory is usable as a root.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }

    /// Human-readable description of the result.
    pub fn message(&self) -> String {
        match self {
            Self::ReadWrite => "directory is accessible with read/write permission".to_string(),
            Self::Missing => "directory does not exist".to_string(),
            Self::PermissionDenied => {
                "permission denied: choose another directory or run with more privileges"
                    .to_string()
            }
            Self::Failed(e) => format!("failed to check directory access: {e}"),
        }
    }
}

/// Probe a directory by creating and removing a scratch file inside it.
pub fn check_access(path: &Path) -> AccessCheck {
    if !path.is_dir() {
        return AccessCheck::Missing;
    }

    let probe = path.join(format!(".filedeck-probe-{}", uuid::Uuid::new_v4().simple()));
    match fs::write(&probe, b"probe") {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return AccessCheck::PermissionDenied,
        Err(e) => return AccessCheck::Failed(e.to_string()),
    }

    match fs::remove_file(&probe) {
        Ok(()) => AccessCheck::ReadWrite,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => AccessCheck::PermissionDenied,
        Err(e) => AccessCheck::Failed(e.to_string()),
    }
}

/// Process-wide root directory with an explicit get/set contract.
#[derive(Debug)]
pub struct RootConfig {
    /// Current root. Replaced wholesale by `set`.
    current: RwLock<PathBuf>,
    /// Fallback used when no root is configured.
    default_root: PathBuf,
}

impl RootConfig {
    /// Create the provider.
    ///
    /// With `configured == None` the default root is created if missing and
    /// used. A configured root must already exist and be writable.
    pub fn new(configured: Option<PathBuf>, default_root: PathBuf) -> Result<Self> {
        let initial = match configured {
            Some(path) => {
                ensure_usable(&path)?;
                path
            }
            None => {
                fs::create_dir_all(&default_root)?;
                debug!(path = %default_root.display(), "Using default root");
                default_root.clone()
            }
        };

        Ok(Self {
            current: RwLock::new(initial),
            default_root,
        })
    }

    /// Current root directory.
    pub fn get(&self) -> Result<PathBuf> {
        let guard = self.current.read().map_err(|_| EngineError::LockPoisoned {
            context: "root config read".to_string(),
        })?;
        Ok(guard.clone())
    }

    /// Replace the root directory and return the previous one.
    ///
    /// The new path must be absolute, exist and pass [`check_access`].
    pub fn set(&self, path: PathBuf) -> Result<PathBuf> {
        if !path.is_absolute() {
            return Err(EngineError::InvalidPath(format!(
                "root must be an absolute path: {}",
                path.display()
            )));
        }
        ensure_usable(&path)?;

        let mut guard = self.current.write().map_err(|_| EngineError::LockPoisoned {
            context: "root config write".to_string(),
        })?;
        info!(from = %guard.display(), to = %path.display(), "Root directory changed");
        Ok(std::mem::replace(&mut *guard, path))
    }

    /// Put back a root previously returned by [`Self::set`].
    ///
    /// The path is not re-validated; this undoes a change whose follow-up
    /// step failed.
    pub fn revert(&self, previous: PathBuf) -> Result<()> {
        let mut guard = self.current.write().map_err(|_| EngineError::LockPoisoned {
            context: "root config write".to_string(),
        })?;
        warn!(from = %guard.display(), to = %previous.display(), "Root directory change reverted");
        *guard = previous;
        Ok(())
    }

    /// Switch back to the default root, creating it if needed.
    pub fn restore_default(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.default_root)?;
        self.set(self.default_root.clone())?;
        Ok(self.default_root.clone())
    }

    /// The fallback root directory.
    pub fn default_root(&self) -> &Path {
        &self.default_root
    }

    /// Snapshot the current root into a resolver for one operation.
    pub fn resolver(&self) -> Result<PathResolver> {
        PathResolver::new(&self.get()?)
    }
}

fn ensure_usable(path: &Path) -> Result<()> {
    match check_access(path) {
        AccessCheck::ReadWrite => Ok(()),
        AccessCheck::Missing => Err(EngineError::NotFound(format!(
            "root directory does not exist: {}",
            path.display()
        ))),
        AccessCheck::PermissionDenied => Err(EngineError::Io(std::io::Error::new(
            ErrorKind::PermissionDenied,
            format!("root directory is not writable: {}", path.display()),
        ))),
        AccessCheck::Failed(e) => Err(EngineError::Io(std::io::Error::other(e))),
    }
}
