//! Downloads: single-file streaming and ZIP archives.
//!
//! Archives are built into a scratch directory as `<uuid>.zip`. The HTTP
//! layer opens a finished archive with [`ArchiveJob::open_for_send`], which
//! unlinks it right away; anything left behind (a client that disconnected
//! before the send started, a crash) is removed by [`ArchiveBuilder::reap_stale`].

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::collision::occupied;
use crate::content_type::mime_type;
use crate::error::{EngineError, Result};
use crate::paths::PathResolver;
use crate::root::RootConfig;

/// Content type of every archive produced here.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Display name of a multi-path archive.
pub const MULTIPLE_ARCHIVE_NAME: &str = "download.zip";

/// A plain file to stream without archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFileDownload {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File name shown to the client.
    pub display_name: String,
    /// Guessed MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// A finished archive waiting to be sent.
#[derive(Debug)]
pub struct ArchiveJob {
    path: PathBuf,
    display_name: String,
}

impl ArchiveJob {
    /// Scratch file holding the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name shown to the client.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Always `application/zip`.
    pub fn content_type(&self) -> &'static str {
        ZIP_CONTENT_TYPE
    }

    /// Open the archive for streaming and unlink it from the scratch dir.
    ///
    /// The returned handle keeps the data readable until it is dropped.
    /// Where an open file cannot be unlinked the archive stays for the
    /// reaper.
    pub fn open_for_send(self) -> Result<(File, u64)> {
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();

        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Archive left for reaper");
        }
        Ok((file, size))
    }

    /// Delete the archive without sending it.
    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to discard archive");
        }
    }
}

/// What a download request produces.
#[derive(Debug)]
pub enum Download {
    /// Stream the file as-is.
    File(SingleFileDownload),
    /// Stream a ZIP of a directory.
    Archive(ArchiveJob),
}

/// Builds downloads against the current root.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    root: Arc<RootConfig>,
    scratch_dir: PathBuf,
}

impl ArchiveBuilder {
    /// Create a builder, creating the scratch directory if needed.
    pub fn new(root: Arc<RootConfig>, scratch_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&scratch_dir)?;
        Ok(Self { root, scratch_dir })
    }

    /// Directory holding in-flight archives.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Prepare a download for one logical path: the file itself, or a ZIP
    /// named `<dir>.zip` for a directory.
    pub fn download(&self, logical: &str) -> Result<Download> {
        let resolver = self.root.resolver()?;
        let absolute = resolver.resolve(logical)?;

        if absolute.is_dir() {
            return self.directory(&resolver, &absolute).map(Download::Archive);
        }
        single_file(&absolute).map(Download::File)
    }

    /// Archive a directory under the root.
    pub fn directory(&self, resolver: &PathResolver, absolute: &Path) -> Result<ArchiveJob> {
        if !absolute.is_dir() {
            return Err(EngineError::NotFound(format!(
                "directory does not exist: {}",
                absolute.display()
            )));
        }

        let display_name = match absolute.file_name() {
            Some(name) if !resolver.is_root(absolute) => {
                format!("{}.zip", name.to_string_lossy())
            }
            _ => "root.zip".to_string(),
        };
        self.write_archive(resolver, &[absolute.to_path_buf()], display_name)
    }

    /// Archive several logical paths into `download.zip`.
    ///
    /// Every path is resolved and checked before the archive is started; a
    /// missing path fails the whole request.
    pub fn multiple(&self, logical_paths: &[String]) -> Result<ArchiveJob> {
        if logical_paths.is_empty() {
            return Err(EngineError::BadRequest("no paths to download".to_string()));
        }

        let resolver = self.root.resolver()?;
        let mut sources = Vec::with_capacity(logical_paths.len());
        for logical in logical_paths {
            let absolute = resolver.resolve(logical)?;
            if !occupied(&absolute) {
                return Err(EngineError::NotFound(format!("path does not exist: {logical}")));
            }
            sources.push(absolute);
        }

        self.write_archive(&resolver, &sources, MULTIPLE_ARCHIVE_NAME.to_string())
    }

    /// Remove archives in the scratch directory older than `max_age`.
    ///
    /// Returns how many were removed.
    pub fn reap_stale(&self, max_age: Duration) -> Result<usize> {
        if !self.scratch_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.scratch_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e != "zip").unwrap_or(true) {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            let Some(age) = age else {
                continue;
            };

            if age >= max_age {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove stale archive")
                    }
                }
            }
        }

        if removed > 0 {
            info!(removed, "Reaped stale archives");
        }
        Ok(removed)
    }

    fn write_archive(
        &self,
        resolver: &PathResolver,
        sources: &[PathBuf],
        display_name: String,
    ) -> Result<ArchiveJob> {
        let path = self
            .scratch_dir
            .join(format!("{}.zip", uuid::Uuid::new_v4()));
        let job = ArchiveJob {
            path,
            display_name,
        };

        match write_zip(resolver, sources, &job.path) {
            Ok(entries) => {
                debug!(
                    archive = %job.path.display(),
                    name = %job.display_name,
                    entries,
                    "Archive built"
                );
                Ok(job)
            }
            Err(e) => {
                job.discard();
                Err(e)
            }
        }
    }
}

/// Describe a plain file for direct streaming.
pub fn single_file(absolute: &Path) -> Result<SingleFileDownload> {
    let metadata = fs::metadata(absolute)?;
    if !metadata.is_file() {
        return Err(EngineError::NotFound(format!(
            "not a regular file: {}",
            absolute.display()
        )));
    }

    let display_name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok(SingleFileDownload {
        path: absolute.to_path_buf(),
        mime_type: mime_type(absolute),
        display_name,
        size: metadata.len(),
    })
}

/// Write `sources` into a new ZIP file at `target`. Returns the entry count.
fn write_zip(resolver: &PathResolver, sources: &[PathBuf], target: &Path) -> Result<usize> {
    let file = File::create(target)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(true);
    let mut entries = 0;
    let mut emitted = HashSet::new();

    for source in sources {
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            let entry_path = entry.path();

            // Symlinks are archived only when their target stays inside the root.
            let is_dir = if entry.path_is_symlink() {
                match fs::canonicalize(entry_path) {
                    Ok(target) if target.starts_with(resolver.root()) => target.is_dir(),
                    _ => {
                        warn!(path = %entry_path.display(), "Skipping symlink leaving the root");
                        continue;
                    }
                }
            } else {
                entry.file_type().is_dir()
            };

            let name = resolver.to_logical(entry_path)?;
            if name.is_empty() {
                continue;
            }
            let name = if is_dir { format!("{name}/") } else { name };

            // Overlapping or repeated selections reach the same entry twice.
            if !emitted.insert(name.clone()) {
                debug!(entry = %name, "Skipping duplicate archive entry");
                continue;
            }

            if is_dir {
                zip.add_directory(name, options)?;
            } else {
                zip.start_file(name, options)?;
                let mut input = File::open(entry_path)?;
                io::copy(&mut input, &mut zip)?;
            }
            entries += 1;
        }
    }

    let mut file = zip.finish()?;
    file.flush()?;
    Ok(entries)
}
