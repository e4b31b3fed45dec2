//! Admin credential hashing and cookie sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "filedeck_session";

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Credential errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("an admin account already exists")]
    AlreadyRegistered,
}

/// Random 16-byte salt, hex encoded.
pub fn generate_salt() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Hex SHA-256 of `salt ‖ password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The single admin credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub salt: String,
    pub hash: String,
}

impl Credential {
    /// Hash a new password with a fresh salt.
    pub fn new(username: &str, password: &str) -> Result<Self, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let salt = generate_salt();
        Ok(Self {
            username: username.to_string(),
            hash: hash_password(&salt, password),
            salt,
        })
    }

    /// Check a login attempt.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let candidate = hash_password(&self.salt, password);
        let hash_ok = constant_time_eq(candidate.as_bytes(), self.hash.as_bytes());
        hash_ok && username.trim() == self.username
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    username: String,
    expires_at: Instant,
}

/// In-memory session table keyed by cookie token.
pub struct SessionStore {
    sessions: DashMap<String, SessionRecord>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session and return its token (32 random bytes, hex).
    pub fn create(&self, username: &str) -> String {
        let token = hex::encode(rand::random::<[u8; 32]>());
        self.sessions.insert(
            token.clone(),
            SessionRecord {
                username: username.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::info!(user = %username, active = self.len(), "Session created");
        token
    }

    /// User name for a live token. Expired tokens are dropped.
    pub fn validate(&self, token: &str) -> Option<String> {
        let expired = match self.sessions.get(token) {
            Some(record) if record.expires_at > Instant::now() => {
                return Some(record.username.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(token);
            tracing::debug!("Session expired");
        }
        None
    }

    /// End one session.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// End every session (after a password change).
    pub fn revoke_all(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        tracing::info!(count, "Revoked all sessions");
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop expired sessions.
    pub fn cleanup(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let now = Instant::now();
        let before = self.len();
        self.sessions.retain(|_, record| record.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    /// Starts a background task that periodically drops expired sessions.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                store.cleanup();
            }
        });
    }
}

/// Pull the session token out of a `Cookie` header value.
pub fn session_token(cookie_header: &str) -> Option<&str> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}

/// `Set-Cookie` value that installs a session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that clears the session.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
