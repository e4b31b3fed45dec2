//! Directory listing and text preview.
//!
//! Lists the immediate children of a directory under the root with the
//! metadata the file manager UI needs. Output order is deterministic:
//! directories first, then files, each group sorted by case-insensitive
//! name.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::content_type::{icon_class, is_previewable_text, IconClass};
use crate::error::{EngineError, Result};
use crate::paths::{join_logical, PathResolver};

/// Whether entries whose name starts with `.` are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HiddenEntries {
    /// List dotfiles like any other entry.
    #[default]
    Include,
    /// Leave dotfiles out.
    Exclude,
}

impl HiddenEntries {
    /// Build the policy from a boolean "include hidden" flag.
    pub fn from_flag(include_hidden: bool) -> Self {
        if include_hidden {
            Self::Include
        } else {
            Self::Exclude
        }
    }
}

/// A directory entry with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Stable identifier derived from the logical path.
    pub id: String,
    /// Entry name (not full path).
    pub name: String,
    /// Logical path relative to the root.
    pub path: String,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp, Unix seconds.
    pub modified: u64,
    /// Icon class for display.
    pub icon: IconClass,
    /// Coarse kind of entry, see [`IconClass::category`].
    pub category: String,
    /// Whether the text preview is available.
    pub previewable: bool,
}

/// Text preview of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    /// File content decoded as UTF-8.
    pub content: String,
}

/// Stable 8-hex-digit identifier for a logical path.
pub fn entry_id(logical: &str) -> String {
    let digest = Sha256::digest(logical.as_bytes());
    hex::encode(&digest[..4])
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Directories before files, then case-insensitive name.
fn entry_order(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    }
}

/// Directory lister bound to a hidden-entry policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryLister {
    hidden: HiddenEntries,
}

impl DirectoryLister {
    /// Create a lister with the given hidden-entry policy.
    pub fn new(hidden: HiddenEntries) -> Self {
        Self { hidden }
    }

    /// List the immediate children of a logical directory.
    pub fn list(&self, resolver: &PathResolver, logical_dir: &str) -> Result<Vec<DirectoryEntry>> {
        let absolute = resolver.resolve(logical_dir)?;

        let metadata = fs::metadata(&absolute).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(format!("directory does not exist: {logical_dir}"))
            } else {
                EngineError::Io(e)
            }
        })?;
        if !metadata.is_dir() {
            return Err(EngineError::NotFound(format!(
                "not a directory: {logical_dir}"
            )));
        }

        let base = resolver.to_logical(&absolute)?;
        let mut results = Vec::new();

        for entry_result in fs::read_dir(&absolute)? {
            let entry = match entry_result {
                Ok(e) => e,
                Err(_) => continue, // Skip entries we can't read
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.hidden == HiddenEntries::Exclude && name.starts_with('.') {
                continue;
            }

            // Follows symlinks; a dangling link falls back to its own metadata.
            let metadata = match fs::metadata(entry.path()).or_else(|_| entry.metadata()) {
                Ok(m) => m,
                Err(_) => continue,
            };

            results.push(build_entry(&base, name, &metadata));
        }

        results.sort_by(entry_order);
        debug!(path = %logical_dir, count = results.len(), "Listed directory");
        Ok(results)
    }

    /// Read a previewable text file.
    ///
    /// Missing files, directories and files outside the text allow-list all
    /// report `NotFound`.
    pub fn preview(&self, resolver: &PathResolver, logical_file: &str) -> Result<Preview> {
        let absolute = resolver.resolve(logical_file)?;

        if !absolute.is_file() || !is_previewable_text(&absolute) {
            return Err(EngineError::NotFound(format!(
                "file does not exist or is not previewable text: {logical_file}"
            )));
        }

        let bytes = fs::read(&absolute)?;
        Ok(Preview {
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn build_entry(base: &str, name: String, metadata: &fs::Metadata) -> DirectoryEntry {
    let is_directory = metadata.is_dir();
    let path = join_logical(base, &name);

    let icon = icon_class(&name, is_directory);

    DirectoryEntry {
        id: entry_id(&path),
        icon,
        category: icon.category().to_string(),
        previewable: !is_directory && is_previewable_text(Path::new(&name)),
        size: if is_directory { 0 } else { metadata.len() },
        modified: unix_seconds(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH)),
        is_directory,
        name,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_structure(dir: &Path) {
        fs::create_dir_all(dir.join("subdir")).unwrap();
        fs::create_dir_all(dir.join(".hidden_dir")).unwrap();
        fs::write(dir.join("file.txt"), "Hello").unwrap();
        fs::write(dir.join("subdir/nested.txt"), "Nested").unwrap();
        fs::write(dir.join(".hidden"), "Hidden").unwrap();
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_list_directory_includes_hidden_by_default() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let entries = DirectoryLister::default().list(&resolver, "/").unwrap();

        assert_eq!(names(&entries), vec![".hidden_dir", "subdir", ".hidden", "file.txt"]);
    }

    #[test]
    fn test_list_directory_excluding_hidden() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let lister = DirectoryLister::new(HiddenEntries::Exclude);
        let entries = lister.list(&resolver, "").unwrap();

        assert_eq!(names(&entries), vec!["subdir", "file.txt"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].icon, IconClass::Folder);
        assert_eq!(entries[1].size, 5);
        assert!(entries[1].previewable);
        assert_eq!(entries[1].path, "file.txt");
    }

    #[test]
    fn test_list_nested_paths_are_logical() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let entries = DirectoryLister::default().list(&resolver, "/subdir/").unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "subdir/nested.txt");
        assert_eq!(entries[0].id, entry_id("subdir/nested.txt"));
    }

    #[test]
    fn test_directory_sorting() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("zebra.txt"), "z").unwrap();
        fs::write(temp_dir.path().join("Apple.txt"), "a").unwrap();
        fs::create_dir_all(temp_dir.path().join("beta_dir")).unwrap();
        fs::create_dir_all(temp_dir.path().join("Alpha_dir")).unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let entries = DirectoryLister::default().list(&resolver, "").unwrap();

        assert_eq!(
            names(&entries),
            vec!["Alpha_dir", "beta_dir", "Apple.txt", "zebra.txt"]
        );
    }

    #[test]
    fn test_list_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        let lister = DirectoryLister::default();

        let first = lister.list(&resolver, "").unwrap();
        let second = lister.list(&resolver, "").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("empty")).unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let entries = DirectoryLister::default().list(&resolver, "empty").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_list_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let result = DirectoryLister::default().list(&resolver, "missing");
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_list_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.txt"), "Hello").unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let result = DirectoryLister::default().list(&resolver, "file.txt");
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_list_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let result = DirectoryLister::default().list(&resolver, "../");
        assert!(matches!(result, Err(EngineError::InvalidPath(_))));
    }

    #[test]
    fn test_non_ascii_names() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("报告.md"), "# 标题").unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let entries = DirectoryLister::default().list(&resolver, "").unwrap();
        assert_eq!(entries[0].name, "报告.md");
        assert!(entries[0].previewable);
    }

    #[test]
    fn test_preview_text_file() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let resolver = PathResolver::new(temp_dir.path()).unwrap();

        let preview = DirectoryLister::default()
            .preview(&resolver, "subdir/nested.txt")
            .unwrap();
        assert_eq!(preview.content, "Nested");
    }

    #[test]
    fn test_preview_rejects_binary_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("image.png"), [0x89, 0x50]).unwrap();
        fs::create_dir_all(temp_dir.path().join("dir.txt")).unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        let lister = DirectoryLister::default();

        for path in ["image.png", "missing.txt", "dir.txt"] {
            assert!(matches!(
                lister.preview(&resolver, path),
                Err(EngineError::NotFound(_))
            ));
        }
    }

    #[test]
    fn test_entry_serialization() {
        let entry = DirectoryEntry {
            id: "0a1b2c3d".to_string(),
            name: "test.txt".to_string(),
            path: "docs/test.txt".to_string(),
            is_directory: false,
            size: 1024,
            modified: 1704067200,
            icon: IconClass::Code,
            category: IconClass::Code.category().to_string(),
            previewable: true,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["is_directory"], false);
        assert_eq!(json["icon"], "fa-file-code");
        assert_eq!(json["category"], "code");
        assert_eq!(json["modified"], 1704067200);
    }
}
