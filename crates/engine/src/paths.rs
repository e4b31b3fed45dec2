//! Logical path resolution against the root directory.
//!
//! A logical path is the slash-separated path the client sees. It is always
//! relative to the root, whatever the number of leading slashes. Resolution
//! normalizes `.` and `..` lexically, refuses anything that would climb above
//! the root, and then canonicalizes the deepest existing ancestor so that a
//! symlink pointing outside the root is rejected as well.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{EngineError, Result};

/// Maps logical paths to absolute paths under one root snapshot.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Canonical root directory.
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given root directory.
    pub fn new(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(format!("root directory missing: {}", root.display()))
            } else {
                EngineError::Io(e)
            }
        })?;
        Ok(Self { root })
    }

    /// Canonical root this resolver is bound to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `absolute` is the root itself.
    pub fn is_root(&self, absolute: &Path) -> bool {
        absolute == self.root
    }

    /// Resolve a logical path to an absolute path under the root.
    ///
    /// The target does not need to exist. Fails with `InvalidPath` when the
    /// path contains a NUL byte, climbs above the root, or passes through a
    /// symlink that leads outside the root.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf> {
        if logical.contains('\0') {
            warn!("Rejected logical path containing NUL byte");
            return Err(EngineError::InvalidPath(
                "path contains a NUL byte".to_string(),
            ));
        }

        let relative = logical.trim_start_matches('/');
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(name) => parts.push(name),
                Component::CurDir => continue,
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        warn!(path = %logical, "Path traversal attempt above root");
                        return Err(EngineError::InvalidPath(format!(
                            "path escapes root: {logical}"
                        )));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    warn!(path = %logical, "Absolute component in logical path");
                    return Err(EngineError::InvalidPath(format!(
                        "absolute path not allowed: {logical}"
                    )));
                }
            }
        }

        let mut candidate = self.root.clone();
        candidate.extend(parts);
        self.verify_contained(&candidate, logical)?;
        Ok(candidate)
    }

    /// Map an absolute path under the root back to its logical path.
    ///
    /// The root itself maps to the empty string. Separators are always `/`.
    pub fn to_logical(&self, absolute: &Path) -> Result<String> {
        let relative = match absolute.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let canonical = fs::canonicalize(absolute).map_err(|_| {
                    EngineError::InvalidPath(format!(
                        "path is outside the root: {}",
                        absolute.display()
                    ))
                })?;
                canonical
                    .strip_prefix(&self.root)
                    .map(Path::to_path_buf)
                    .map_err(|_| {
                        EngineError::InvalidPath(format!(
                            "path is outside the root: {}",
                            absolute.display()
                        ))
                    })?
            }
        };

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Ok(segments.join("/"))
    }

    /// Check that the deepest existing ancestor of `candidate` canonicalizes
    /// to somewhere inside the root.
    fn verify_contained(&self, candidate: &Path, logical: &str) -> Result<()> {
        for ancestor in candidate.ancestors() {
            if !ancestor.starts_with(&self.root) {
                break;
            }
            // Dangling links and missing components fail here; keep climbing.
            let Ok(canonical) = fs::canonicalize(ancestor) else {
                continue;
            };
            if canonical.starts_with(&self.root) {
                return Ok(());
            }
            warn!(
                path = %logical,
                resolved = %canonical.display(),
                "Symlink escape attempt"
            );
            return Err(EngineError::InvalidPath(format!(
                "path resolves outside root: {logical}"
            )));
        }

        Err(EngineError::NotFound(format!(
            "root directory missing: {}",
            self.root.display()
        )))
    }
}

/// Last segment of a logical path, ignoring trailing slashes.
pub fn base_name(logical: &str) -> Option<&str> {
    logical
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// Join a logical directory and a child name.
pub fn join_logical(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
