//! Upload, delete, duplicate check and copy/move ("paste").
//!
//! All batch operations are best-effort: a failing item lands in the
//! outcome's `failed` bucket and the remaining items still run. Only
//! request-level problems (a path that escapes the root, empty input) are
//! returned as errors, and those are detected before any I/O happens.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::collision::{self, occupied, remove_existing, ConflictPolicy, Resolution};
use crate::error::{EngineError, Result};
use crate::listing::{DirectoryEntry, DirectoryLister, HiddenEntries, Preview};
use crate::paths::{base_name, PathResolver};
use crate::root::RootConfig;

/// Default per-file upload limit (100MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// A fully buffered uploaded file.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Client-supplied file name.
    pub name: String,
    /// File content.
    pub data: Vec<u8>,
}

impl IncomingFile {
    /// Create an incoming file.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A clipboard entry produced by the client for copy/cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Display name. The name used on disk is always the last segment of
    /// `path`.
    #[serde(default)]
    pub name: String,
    /// Logical path of the source.
    pub path: String,
    /// Whether the source is a directory.
    #[serde(default)]
    pub is_directory: bool,
}

impl FileReference {
    /// Reference a logical path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = base_name(&path).unwrap_or_default().to_string();
        Self {
            name,
            path,
            is_directory: false,
        }
    }
}

/// Paste mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PasteOperation {
    /// Duplicate the source.
    Copy,
    /// Relocate the source.
    Move,
    /// Unrecognized operation; every item is skipped.
    Unknown,
}

impl PasteOperation {
    /// Parse a client-supplied operation string.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "copy" => Self::Copy,
            "move" | "cut" => Self::Move,
            other => {
                warn!(operation = %other, "Unrecognized paste operation");
                Self::Unknown
            }
        }
    }
}

impl From<String> for PasteOperation {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// Result of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Final names of written files.
    pub uploaded: Vec<String>,
    /// Names left alone because of a collision.
    pub skipped: Vec<String>,
    /// Names that could not be written.
    pub failed: Vec<String>,
}

/// Result of a delete batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Logical paths removed.
    pub deleted: Vec<String>,
    /// Logical paths that were missing or could not be removed.
    pub failed: Vec<String>,
}

/// Result of a paste batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasteOutcome {
    /// Final names written into the target directory.
    pub pasted: Vec<String>,
    /// Names left alone because of a collision.
    pub skipped: Vec<String>,
    /// Names that could not be pasted.
    pub failed: Vec<String>,
}

impl UploadOutcome {
    /// Whether any item failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Short summary for the client.
    pub fn message(&self) -> String {
        summary("Uploaded", self.uploaded.len(), self.skipped.len(), self.failed.len())
    }
}

impl DeleteOutcome {
    /// Whether any item failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Short summary for the client.
    pub fn message(&self) -> String {
        summary("Deleted", self.deleted.len(), 0, self.failed.len())
    }
}

impl PasteOutcome {
    /// Whether any item failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Short summary for the client.
    pub fn message(&self) -> String {
        summary("Pasted", self.pasted.len(), self.skipped.len(), self.failed.len())
    }
}

fn summary(verb: &str, done: usize, skipped: usize, failed: usize) -> String {
    let mut parts = vec![format!("{verb} {done} item(s)")];
    if skipped > 0 {
        parts.push(format!("skipped {skipped}"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    parts.join(", ")
}

/// A single path segment that is safe to create inside a directory.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Where the entry `path` itself lives: its parent canonicalised, joined
/// with its own name. A symlink is not followed.
fn entry_location(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Copy a file, symlink or directory tree.
pub fn copy_recursive(source: &Path, target: &Path) -> std::io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;

    if metadata.file_type().is_symlink() {
        return copy_symlink(source, target);
    }

    if metadata.is_dir() {
        fs::create_dir(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &target.join(entry.file_name()))?;
        }
        return Ok(());
    }

    fs::copy(source, target).map(|_| ())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

/// Rename, falling back to copy + delete across filesystems.
pub fn move_entry(source: &Path, target: &Path) -> std::io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(from = %source.display(), to = %target.display(), "Cross-device move, copying");
            copy_recursive(source, target)?;
            remove_existing(source)
        }
        Err(e) => Err(e),
    }
}

/// File-operation engine bound to a root provider.
#[derive(Debug, Clone)]
pub struct FileOperationEngine {
    root: Arc<RootConfig>,
    lister: DirectoryLister,
    max_file_size: u64,
}

impl FileOperationEngine {
    /// Create an engine over the given root provider.
    pub fn new(root: Arc<RootConfig>) -> Self {
        Self {
            root,
            lister: DirectoryLister::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set the hidden-entry policy used by `list`.
    pub fn with_hidden_entries(mut self, hidden: HiddenEntries) -> Self {
        self.lister = DirectoryLister::new(hidden);
        self
    }

    /// Set the per-file upload limit.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// The root provider.
    pub fn root(&self) -> &Arc<RootConfig> {
        &self.root
    }

    /// List a logical directory.
    pub fn list(&self, logical_dir: &str) -> Result<Vec<DirectoryEntry>> {
        self.lister.list(&self.root.resolver()?, logical_dir)
    }

    /// Read a previewable text file.
    pub fn preview(&self, logical_file: &str) -> Result<Preview> {
        self.lister.preview(&self.root.resolver()?, logical_file)
    }

    /// Write uploaded files into a logical directory, creating it if needed.
    ///
    /// An existing name with `Unspecified` policy is skipped; interactive
    /// conflict handling is done by calling [`Self::check_duplicates`] first.
    pub fn upload(
        &self,
        target_dir: &str,
        files: Vec<IncomingFile>,
        policy: ConflictPolicy,
    ) -> Result<UploadOutcome> {
        if files.is_empty() {
            return Err(EngineError::BadRequest("no files to upload".to_string()));
        }

        let resolver = self.root.resolver()?;
        let dir = resolver.resolve(target_dir)?;

        if !dir.exists() {
            info!(path = %target_dir, "Creating upload directory");
            fs::create_dir_all(&dir)?;
        } else if !dir.is_dir() {
            return Err(EngineError::BadRequest(format!(
                "upload target is not a directory: {target_dir}"
            )));
        }

        let mut outcome = UploadOutcome::default();

        for file in files {
            if !is_plain_name(&file.name) {
                warn!(name = %file.name, "Rejected upload file name");
                outcome.failed.push(file.name);
                continue;
            }
            if file.data.len() as u64 > self.max_file_size {
                warn!(
                    name = %file.name,
                    size = file.data.len(),
                    limit = self.max_file_size,
                    "Upload exceeds size limit"
                );
                outcome.failed.push(file.name);
                continue;
            }

            match collision::resolve_target(&dir, &file.name, policy) {
                Ok(resolution @ Resolution::Write { .. }) => {
                    let final_name = resolution.file_name().unwrap_or_else(|| file.name.clone());
                    match write_upload(&dir, &resolution, &file.data) {
                        Ok(()) => {
                            debug!(name = %final_name, size = file.data.len(), "Stored upload");
                            outcome.uploaded.push(final_name);
                        }
                        Err(e) => {
                            error!(name = %file.name, error = %e, "Failed to store upload");
                            outcome.failed.push(file.name);
                        }
                    }
                }
                Ok(Resolution::Skip) => outcome.skipped.push(file.name),
                Err(EngineError::Conflict(_)) => {
                    warn!(name = %file.name, "Upload collides and no policy was given, skipping");
                    outcome.skipped.push(file.name);
                }
                Err(e) => {
                    error!(name = %file.name, error = %e, "Failed to resolve upload target");
                    outcome.failed.push(file.name);
                }
            }
        }

        info!(
            path = %target_dir,
            uploaded = outcome.uploaded.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Upload finished"
        );
        Ok(outcome)
    }

    /// Delete logical paths, recursively for directories.
    pub fn delete(&self, logical_paths: &[String]) -> Result<DeleteOutcome> {
        if logical_paths.is_empty() {
            return Err(EngineError::BadRequest("no paths to delete".to_string()));
        }

        let resolver = self.root.resolver()?;
        let resolved = logical_paths
            .iter()
            .map(|p| resolver.resolve(p).map(|abs| (p.clone(), abs)))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = DeleteOutcome::default();

        for (logical, absolute) in resolved {
            if resolver.is_root(&absolute) {
                warn!("Refusing to delete the root directory");
                outcome.failed.push(logical);
                continue;
            }
            if !occupied(&absolute) {
                debug!(path = %logical, "Delete target does not exist");
                outcome.failed.push(logical);
                continue;
            }

            match remove_existing(&absolute) {
                Ok(()) => {
                    debug!(path = %logical, "Deleted");
                    outcome.deleted.push(logical);
                }
                Err(e) => {
                    error!(path = %logical, error = %e, "Failed to delete");
                    outcome.failed.push(logical);
                }
            }
        }

        info!(
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "Delete finished"
        );
        Ok(outcome)
    }

    /// Names of `refs` that already exist in the target directory.
    pub fn check_duplicates(
        &self,
        target_dir: &str,
        refs: &[FileReference],
    ) -> Result<BTreeSet<String>> {
        let resolver = self.root.resolver()?;
        let dir = resolver.resolve(target_dir)?;
        Ok(collision::find_duplicates(
            &dir,
            refs.iter().filter_map(|r| base_name(&r.path)),
        ))
    }

    /// Copy or move referenced entries into a logical directory.
    pub fn paste(
        &self,
        target_dir: &str,
        refs: &[FileReference],
        operation: PasteOperation,
        policy: ConflictPolicy,
    ) -> Result<PasteOutcome> {
        if refs.is_empty() {
            return Err(EngineError::BadRequest("no files to paste".to_string()));
        }

        let resolver = self.root.resolver()?;
        let dir = resolver.resolve(target_dir)?;
        let sources = refs
            .iter()
            .map(|r| resolver.resolve(&r.path).map(|abs| (r, abs)))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = PasteOutcome::default();

        if operation == PasteOperation::Unknown {
            outcome.skipped = refs
                .iter()
                .map(|r| base_name(&r.path).unwrap_or(&r.path).to_string())
                .collect();
            return Ok(outcome);
        }

        for (reference, source) in sources {
            let Some(name) = base_name(&reference.path) else {
                warn!(path = %reference.path, "Paste source has no file name");
                outcome.failed.push(reference.path.clone());
                continue;
            };
            if resolver.is_root(&source) || !occupied(&source) {
                warn!(path = %reference.path, "Paste source does not exist");
                outcome.failed.push(name.to_string());
                continue;
            }

            let resolution = match collision::resolve_target(&dir, name, policy) {
                Ok(resolution) => resolution,
                Err(EngineError::Conflict(_)) => {
                    warn!(name = %name, "Paste collides and no policy was given, skipping");
                    outcome.skipped.push(name.to_string());
                    continue;
                }
                Err(e) => {
                    error!(name = %name, error = %e, "Failed to resolve paste target");
                    outcome.failed.push(name.to_string());
                    continue;
                }
            };

            let Resolution::Write {
                target,
                replace_existing,
            } = resolution
            else {
                outcome.skipped.push(name.to_string());
                continue;
            };

            let final_name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string());

            match paste_one(&source, &target, replace_existing, operation) {
                Ok(()) => {
                    debug!(
                        from = %reference.path,
                        to = %final_name,
                        operation = ?operation,
                        "Pasted"
                    );
                    outcome.pasted.push(final_name);
                }
                Err(e) => {
                    error!(name = %name, error = %e, "Paste failed");
                    outcome.failed.push(name.to_string());
                }
            }
        }

        info!(
            path = %target_dir,
            operation = ?operation,
            pasted = outcome.pasted.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Paste finished"
        );
        Ok(outcome)
    }
}

/// Write upload bytes to a hidden sibling, then rename into place.
fn write_upload(dir: &Path, resolution: &Resolution, data: &[u8]) -> std::io::Result<()> {
    let Resolution::Write {
        target,
        replace_existing,
    } = resolution
    else {
        return Ok(());
    };

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{name}.upload-{}", uuid::Uuid::new_v4().simple()));

    fs::write(&temp_path, data)?;

    // A file replaces a file atomically on rename; anything else goes first.
    let result = (|| {
        if *replace_existing {
            let existing = fs::symlink_metadata(target)?;
            if existing.is_dir() {
                fs::remove_dir_all(target)?;
            }
        }
        fs::rename(&temp_path, target)
    })();

    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(path = %temp_path.display(), error = %e, "Failed to clean up upload temp file");
        }
    }
    result
}

/// Copy or move one source into its resolved target.
fn paste_one(
    source: &Path,
    target: &Path,
    replace_existing: bool,
    operation: PasteOperation,
) -> std::io::Result<()> {
    let source_canonical = entry_location(source);
    let target_canonical = entry_location(target);

    if source_canonical == target_canonical {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "source and target are the same path",
        ));
    }
    if target_canonical.starts_with(&source_canonical) {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "cannot paste a directory into itself",
        ));
    }
    if replace_existing && source_canonical.starts_with(&target_canonical) {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "cannot replace a directory that contains the source",
        ));
    }

    if replace_existing {
        remove_existing(target)?;
    }

    match operation {
        PasteOperation::Copy => copy_recursive(source, target),
        PasteOperation::Move => move_entry(source, target),
        PasteOperation::Unknown => Ok(()),
    }
}
