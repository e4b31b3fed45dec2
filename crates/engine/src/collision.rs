//! Name-collision detection and resolution.
//!
//! Nothing destructive happens on an ambiguous collision: with
//! [`ConflictPolicy::Unspecified`] the resolver reports a
//! [`EngineError::Conflict`] and leaves the decision to the caller.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// How to treat a target name that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ConflictPolicy {
    /// Remove the existing entry, then write.
    Replace,
    /// Leave the existing entry alone and do not write.
    Skip,
    /// Write under a fresh `name(n).ext` name.
    Rename,
    /// No decision yet; the caller has to ask the client.
    #[default]
    Unspecified,
}

impl ConflictPolicy {
    /// Parse an optional client-supplied policy string.
    ///
    /// `None` and blank strings are `Unspecified`; unknown values are
    /// treated as `Skip`.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::Unspecified;
        };

        match value.to_ascii_lowercase().as_str() {
            "replace" => Self::Replace,
            "skip" => Self::Skip,
            "rename" => Self::Rename,
            "unspecified" => Self::Unspecified,
            other => {
                warn!(policy = %other, "Unrecognized conflict policy, treating as skip");
                Self::Skip
            }
        }
    }
}

impl From<String> for ConflictPolicy {
    fn from(value: String) -> Self {
        Self::parse(Some(&value))
    }
}

/// Where an incoming entry should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Write to `target`. When `replace_existing` is set the caller must
    /// remove the existing entry first.
    Write {
        /// Final absolute path.
        target: PathBuf,
        /// Whether an existing entry sits at `target`.
        replace_existing: bool,
    },
    /// Do not write this entry.
    Skip,
}

impl Resolution {
    /// Final file name of a `Write` resolution.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Write { target, .. } => target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            Self::Skip => None,
        }
    }
}

/// Whether anything (including a dangling symlink) occupies `path`.
pub fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Names from `incoming` that already exist directly under `target_dir`.
pub fn find_duplicates<I, S>(target_dir: &Path, incoming: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    incoming
        .into_iter()
        .filter(|name| occupied(&target_dir.join(name.as_ref())))
        .map(|name| name.as_ref().to_string())
        .collect()
}

/// `stem(counter)ext` for a file name, keeping only the last extension.
pub fn numbered_name(name: &str, counter: u64) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    match path.extension() {
        Some(ext) => format!("{stem}({counter}).{}", ext.to_string_lossy()),
        None => format!("{stem}({counter})"),
    }
}

/// First unused `name(n)` sibling under `target_dir`, probing from 1.
pub fn next_free_name(target_dir: &Path, name: &str) -> PathBuf {
    let mut counter: u64 = 1;
    loop {
        let candidate = target_dir.join(OsString::from(numbered_name(name, counter)));
        if !occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Decide where `name` should land in `target_dir` under `policy`.
pub fn resolve_target(target_dir: &Path, name: &str, policy: ConflictPolicy) -> Result<Resolution> {
    let target = target_dir.join(name);

    if !occupied(&target) {
        return Ok(Resolution::Write {
            target,
            replace_existing: false,
        });
    }

    match policy {
        ConflictPolicy::Replace => {
            debug!(path = %target.display(), "Replacing existing entry");
            Ok(Resolution::Write {
                target,
                replace_existing: true,
            })
        }
        ConflictPolicy::Skip => {
            debug!(path = %target.display(), "Skipping existing entry");
            Ok(Resolution::Skip)
        }
        ConflictPolicy::Rename => {
            let renamed = next_free_name(target_dir, name);
            debug!(from = %name, to = %renamed.display(), "Renaming to avoid collision");
            Ok(Resolution::Write {
                target: renamed,
                replace_existing: false,
            })
        }
        ConflictPolicy::Unspecified => Err(EngineError::Conflict(vec![name.to_string()])),
    }
}

/// Remove whatever occupies `path`: a directory tree, a file or a link.
pub fn remove_existing(path: &Path) -> std::io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
