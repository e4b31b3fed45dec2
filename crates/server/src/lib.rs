//! # filedeck server
//!
//! Authenticated web file manager on top of the [`engine`] crate.
//!
//! ## Overview
//!
//! - **Configuration**: TOML file with environment overrides
//! - **Settings store**: root directory and admin credential, written back
//!   to the config file when changed
//! - **Session gate**: cookie sessions in front of every `/api` route
//! - **HTTP API**: listing, preview, upload, delete, paste, downloads
//! - **Archive reaper**: periodic cleanup of the archive scratch directory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     server::serve(config, None).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`auth`]: Password hashing and the session table
//! - [`settings`]: Root and credential changes with persistence
//! - [`http`]: Router, handlers and error mapping
//! - [`reaper`]: Archive scratch cleanup task

pub mod auth;
pub mod config;
pub mod http;
pub mod reaper;
pub mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine::{ArchiveBuilder, FileOperationEngine, HiddenEntries, RootConfig};

pub use config::Config;
pub use http::{router, AppState};

/// How often expired sessions are dropped.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Wire the engine, settings and sessions together from a loaded config.
pub fn build_state(config: &Config, config_path: Option<PathBuf>) -> Result<AppState> {
    let root = RootConfig::new(config.files.configured_root(), config::default_root_dir())
        .context("Failed to open root directory")?;
    let root = Arc::new(root);

    let engine = FileOperationEngine::new(Arc::clone(&root))
        .with_hidden_entries(HiddenEntries::from_flag(config.files.include_hidden))
        .with_max_file_size(config.files.max_upload_size);

    let scratch_dir = config.archive.scratch_dir();
    let archives = ArchiveBuilder::new(Arc::clone(&root), scratch_dir.clone()).with_context(
        || format!("Failed to create archive scratch dir: {}", scratch_dir.display()),
    )?;

    let settings = settings::SettingsStore::new(Arc::clone(&root), config.clone(), config_path);
    let sessions = auth::SessionStore::new(config.auth.session_ttl());

    Ok(AppState::new(
        Arc::new(engine),
        Arc::new(archives),
        Arc::new(settings),
        Arc::new(sessions),
        config.files.max_upload_size,
    ))
}

/// Run the HTTP server until Ctrl-C.
pub async fn serve(config: Config, config_path: Option<PathBuf>) -> Result<()> {
    let addr = config.bind_addr()?;
    let state = build_state(&config, config_path)?;

    let root = state.settings.root_settings()?;
    tracing::info!(root = %root.root_path.display(), "Serving root directory");
    if !state.settings.is_registered()? {
        tracing::warn!("No admin account yet; POST /register to create one");
    }

    let reaper = reaper::spawn_reaper(
        Arc::clone(&state.archives),
        config.archive.retention(),
        config.archive.reap_interval(),
    );
    state.sessions.start_cleanup_task(SESSION_CLEANUP_INTERVAL);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    reaper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
