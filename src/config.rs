use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};
use crate::oauth::KeyPair;

pub const DEFAULT_BASE_URL: &str = "https://api.freshbooks.com";
pub const DEFAULT_TOKEN_PATH: &str = "freshbooks_oauth_token.json";

pub const ENV_CLIENT_ID: &str = "FRESHBOOKS_API_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "FRESHBOOKS_API_CLIENT_SECRET";
pub const ENV_ACCOUNT_ID: &str = "FRESHBOOKS_ACCOUNT_ID";
pub const ENV_REDIRECT_URI: &str = "FRESHBOOKS_REDIRECT_URI";
pub const ENV_TOKEN_PATH: &str = "FRESHBOOKS_TOKEN_PATH";
pub const ENV_BASE_URL: &str = "FRESHBOOKS_BASE_URL";

/// Everything needed to talk to one FreshBooks account.
#[derive(Debug, Clone)]
pub struct Config {
    pub key_pair: KeyPair,
    /// The account id used in accounting and payments URLs.
    pub account_id: String,
    /// API host, `https://api.freshbooks.com` unless overridden.
    pub base_url: Url,
    /// Where [`crate::token::FileTokenStore`] keeps the OAuth token.
    pub token_path: PathBuf,
}

impl Config {
    pub fn new(key_pair: KeyPair, account_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            key_pair,
            account_id: account_id.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).map_err(|_| Error::InvalidEndpoint)?,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
        })
    }

    /// Overrides the API host, mostly useful for pointing at a mock server.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidConfig(format!("base url {base_url:?}: {e}")))?;
        Ok(self)
    }

    #[must_use]
    pub fn with_token_path(mut self, token_path: impl Into<PathBuf>) -> Self {
        self.token_path = token_path.into();
        self
    }

    /// Builds a config from the process environment, loading a `.env` file first if
    /// one can be found.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(?path, "loaded environment file"),
            Err(e) if e.not_found() => trace!("no .env file found"),
            Err(e) => warn!("failed to load .env file: {e}"),
        }

        let key_pair = KeyPair::new(
            required_var(ENV_CLIENT_ID)?,
            required_var(ENV_CLIENT_SECRET)?,
            &required_var(ENV_REDIRECT_URI)?,
        )?;
        let mut config = Self::new(key_pair, required_var(ENV_ACCOUNT_ID)?)?;

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config = config.with_base_url(&base_url)?;
        }
        if let Ok(token_path) = std::env::var(ENV_TOKEN_PATH) {
            config = config.with_token_path(token_path);
        }
        Ok(config)
    }
}

fn required_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingConfig(name.to_string())),
    }
}
