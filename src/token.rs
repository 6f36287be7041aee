//! Persisted OAuth tokens and the stores that keep them between runs.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use oauth2::TokenResponse as _;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::oauth::TokenResponse;

/// An OAuth token as it is written to a [`TokenStore`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, counted from `created_at`.
    pub expires_in: i64,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    /// Unix timestamp (seconds) of when the token was issued.
    pub created_at: i64,
}

impl Token {
    pub(crate) fn from_response(response: TokenResponse) -> Self {
        Self::from_response_at(response, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// `now` stands in for `created_at` when the endpoint did not send one.
    pub(crate) fn from_response_at(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token().secret().clone(),
            token_type: response.token_type().0.clone(),
            expires_in: i64::try_from(response.expires_in).unwrap_or(i64::MAX),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .unwrap_or_default(),
            scope: response.scope.clone(),
            created_at: response.created_at.unwrap_or(now),
        }
    }

    /// Unix timestamp after which the token is no longer valid.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.created_at.saturating_add(self.expires_in)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc().unix_timestamp())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &"[redacted]")
            .field("scope", &self.scope)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Somewhere a single OAuth token can be kept.
pub trait TokenStore: fmt::Debug + Send + Sync {
    /// Returns the stored token, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Token>>;

    /// Replaces whatever token is stored.
    fn save(&self, token: &Token) -> Result<()>;

    /// Removes the stored token. Deleting from an empty store is not an error.
    fn delete(&self) -> Result<()>;
}

/// Keeps the token as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    #[instrument]
    fn load(&self) -> Result<Option<Token>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::TokenStore(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::TokenStore(format!("{}: {e}", self.path.display())))
    }

    #[instrument(skip(token))]
    fn save(&self, token: &Token) -> Result<()> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "token file didn't exist, creating it");
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::TokenStore(format!("{}: {e}", parent.display())))?;
            }
        }
        let json = serde_json::to_string(token)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::TokenStore(format!("{}: {e}", self.path.display())))
    }

    #[instrument]
    fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::TokenStore(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// Keeps the token in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Token>>> {
        self.token
            .lock()
            .map_err(|_| Error::TokenStore("memory store lock poisoned".to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Token>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, token: &Token) -> Result<()> {
        *self.lock()? = Some(token.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(created_at: i64, expires_in: i64) -> Token {
        Token {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: "refresh".to_string(),
            scope: None,
            created_at,
        }
    }

    #[test]
    fn expiry_is_strictly_after_lifetime() {
        let token = token(1_000, 100);
        assert!(!token.is_expired_at(1_050));
        assert!(!token.is_expired_at(1_100));
        assert!(token.is_expired_at(1_101));
    }

    #[test]
    fn missing_created_at_falls_back_to_now() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","token_type":"Bearer","expires_in":60,"refresh_token":"r"}"#,
        )
        .unwrap();
        let token = Token::from_response_at(response, 42);
        assert_eq!(token.created_at, 42);
        assert_eq!(token.expires_at(), 102);
        assert_eq!(token.refresh_token, "r");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", token(0, 1));
        assert!(!rendered.contains("access\""));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn memory_store_replaces_and_deletes() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&token(1, 1)).unwrap();
        store.save(&token(2, 1)).unwrap();
        assert_eq!(store.load().unwrap().map(|t| t.created_at), Some(2));
        store.delete().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
