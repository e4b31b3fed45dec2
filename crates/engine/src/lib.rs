//! # filedeck engine
//!
//! The file-operation core of filedeck: everything that touches the managed
//! directory tree lives here, with no knowledge of HTTP.
//!
//! ## Overview
//!
//! Clients address files by *logical path*, a slash-separated path relative
//! to a configurable root directory. The engine:
//!
//! - **Resolves paths**: maps logical paths to absolute ones and refuses
//!   anything that would escape the root (`..`, absolute components,
//!   symlinks leading outside)
//! - **Lists directories**: directories first, case-insensitive name order,
//!   with icon class and previewability per entry
//! - **Resolves collisions**: replace, skip, rename to `name(n).ext`, or
//!   report a conflict when no policy was given
//! - **Runs batch operations**: upload, delete and copy/move with per-item
//!   success/skip/failure reporting
//! - **Builds downloads**: direct file streams and ZIP archives with
//!   root-relative entry names
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    FileOperationEngine                     │
//! │   upload · delete · check_duplicates · paste · list        │
//! ├──────────────────┬──────────────────┬──────────────────────┤
//! │ DirectoryLister  │ CollisionResolver│   ArchiveBuilder     │
//! ├──────────────────┴──────────────────┴──────────────────────┤
//! │        PathResolver (one snapshot per operation)           │
//! ├────────────────────────────────────────────────────────────┤
//! │                RootConfig (get / set root)                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use engine::{ConflictPolicy, FileOperationEngine, IncomingFile, RootConfig};
//!
//! # fn main() -> engine::Result<()> {
//! let root = Arc::new(RootConfig::new(None, "/srv/files".into())?);
//! let engine = FileOperationEngine::new(root);
//!
//! let outcome = engine.upload(
//!     "reports",
//!     vec![IncomingFile::new("q3.txt", "numbers")],
//!     ConflictPolicy::Rename,
//! )?;
//! println!("{}", outcome.message());
//!
//! for entry in engine.list("reports")? {
//!     println!("{} {}", entry.icon.as_str(), entry.path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`root`]: Runtime-mutable root directory and access probing
//! - [`paths`]: Logical path resolution and containment
//! - [`content_type`]: MIME types, icon classes, text allow-list
//! - [`listing`]: Directory listing and text preview
//! - [`collision`]: Duplicate detection and conflict policies
//! - [`ops`]: Upload, delete and paste
//! - [`archive`]: File downloads and ZIP archives
//! - [`error`]: Error types

pub mod archive;
pub mod collision;
pub mod content_type;
pub mod error;
pub mod listing;
pub mod ops;
pub mod paths;
pub mod root;

pub use error::{EngineError, Result};

pub use root::{check_access, AccessCheck, RootConfig};

pub use paths::PathResolver;

pub use content_type::IconClass;

pub use listing::{DirectoryEntry, DirectoryLister, HiddenEntries, Preview};

pub use collision::{ConflictPolicy, Resolution};

pub use ops::{
    DeleteOutcome, FileOperationEngine, FileReference, IncomingFile, PasteOperation,
    PasteOutcome, UploadOutcome,
};

pub use archive::{ArchiveBuilder, ArchiveJob, Download, SingleFileDownload};
