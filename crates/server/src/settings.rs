//! Settings store: root directory and admin credential, persisted to the
//! TOML config file they were loaded from.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use engine::{check_access, AccessCheck, EngineError, RootConfig};
use thiserror::Error;

use crate::auth::{AuthError, Credential};
use crate::config::Config;

/// Settings update failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("directory is not usable: {0}")]
    Access(String),

    #[error("failed to save settings: {0}")]
    Persist(String),

    #[error("settings lock poisoned")]
    LockPoisoned,
}

/// Current root and default root, as shown on the settings page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RootSettings {
    pub root_path: PathBuf,
    pub default_root_path: PathBuf,
}

/// Mutable settings shared by the HTTP handlers and the CLI.
pub struct SettingsStore {
    root: Arc<RootConfig>,
    config: Mutex<Config>,
    config_path: Option<PathBuf>,
}

impl SettingsStore {
    /// Wrap a loaded config. With `config_path == None` changes stay in memory.
    pub fn new(root: Arc<RootConfig>, config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            root,
            config: Mutex::new(config),
            config_path,
        }
    }

    /// The shared root provider.
    pub fn root(&self) -> &Arc<RootConfig> {
        &self.root
    }

    /// File the settings are persisted to.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Config>, SettingsError> {
        self.config.lock().map_err(|_| SettingsError::LockPoisoned)
    }

    /// Current and default root directories.
    pub fn root_settings(&self) -> Result<RootSettings, SettingsError> {
        Ok(RootSettings {
            root_path: self.root.get()?,
            default_root_path: self.root.default_root().to_path_buf(),
        })
    }

    /// Probe a directory without changing anything.
    pub fn check_directory_access(&self, path: &Path) -> AccessCheck {
        check_access(path)
    }

    /// Switch the root directory and persist it.
    pub fn update_root_path(&self, path: PathBuf) -> Result<PathBuf, SettingsError> {
        let access = check_access(&path);
        if !access.is_ok() {
            return Err(SettingsError::Access(access.message()));
        }

        let configured = path.clone();
        self.switch_root(configured, |root| {
            root.set(path.clone())?;
            Ok(path)
        })
    }

    /// Go back to the default root and forget the configured one.
    pub fn restore_default_path(&self) -> Result<PathBuf, SettingsError> {
        self.switch_root(PathBuf::new(), |root| root.restore_default())
    }

    /// Change the live root and the saved one together.
    ///
    /// The config lock is held across both steps. If saving fails the live
    /// root is put back.
    fn switch_root(
        &self,
        configured: PathBuf,
        apply: impl FnOnce(&RootConfig) -> Result<PathBuf, EngineError>,
    ) -> Result<PathBuf, SettingsError> {
        let mut config = self.lock()?;
        let previous = self.root.get()?;
        let path = apply(self.root.as_ref())?;

        let mut next = config.clone();
        next.files.root_path = configured;
        if let Err(e) = self.persist(&next) {
            self.root.revert(previous)?;
            return Err(e);
        }

        *config = next;
        Ok(path)
    }

    /// The stored admin credential, if any.
    pub fn credential(&self) -> Result<Option<Credential>, SettingsError> {
        let config = self.lock()?;
        if !config.auth.has_credential() {
            return Ok(None);
        }
        Ok(Some(Credential {
            username: config.auth.username.clone(),
            salt: config.auth.password_salt.clone(),
            hash: config.auth.password_hash.clone(),
        }))
    }

    /// Whether an admin account exists.
    pub fn is_registered(&self) -> Result<bool, SettingsError> {
        Ok(self.lock()?.auth.has_credential())
    }

    /// Create the admin account. Only allowed while none exists.
    pub fn register(&self, username: &str, password: &str) -> Result<(), SettingsError> {
        let credential = Credential::new(username, password)?;
        self.update(|config| {
            if config.auth.has_credential() {
                return Err(AuthError::AlreadyRegistered.into());
            }
            set_credential(config, &credential);
            Ok(())
        })?;
        tracing::info!(user = %credential.username, "Admin account created");
        Ok(())
    }

    /// Replace the admin password, keeping the user name.
    pub fn update_password(&self, password: &str) -> Result<(), SettingsError> {
        let mut username = String::new();
        self.update(|config| {
            let credential = Credential::new(&config.auth.username, password)?;
            set_credential(config, &credential);
            username = credential.username;
            Ok(())
        })?;
        tracing::info!(user = %username, "Admin password updated");
        Ok(())
    }

    /// Check a login attempt against the stored credential.
    pub fn verify_login(&self, username: &str, password: &str) -> Result<(), SettingsError> {
        match self.credential()? {
            Some(credential) if credential.verify(username, password) => Ok(()),
            _ => Err(AuthError::InvalidCredentials.into()),
        }
    }

    /// Apply a change to a copy of the config, save it, then keep it.
    ///
    /// A failing change or save leaves the in-memory config untouched.
    fn update(
        &self,
        change: impl FnOnce(&mut Config) -> Result<(), SettingsError>,
    ) -> Result<(), SettingsError> {
        let mut config = self.lock()?;
        let mut next = config.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *config = next;
        Ok(())
    }

    fn persist(&self, config: &Config) -> Result<(), SettingsError> {
        match &self.config_path {
            Some(path) => config
                .save(path)
                .map_err(|e| SettingsError::Persist(format!("{e:#}"))),
            None => Ok(()),
        }
    }
}

fn set_credential(config: &mut Config, credential: &Credential) {
    config.auth.username = credential.username.clone();
    config.auth.password_salt = credential.salt.clone();
    config.auth.password_hash = credential.hash.clone();
}
