//! Configuration management for Crosspost
//!
//! Credentials come from the process environment, optionally pre-loaded from
//! a local `.env` file. Nothing is validated at load time: a blank credential
//! surfaces as [`ConfigError::MissingField`] when an adapter first needs it.

use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const DEFAULT_REDDIT_AUTH_URL: &str = "https://www.reddit.com";
pub const DEFAULT_REDDIT_API_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_X_API_URL: &str = "https://api.twitter.com";
pub const DEFAULT_X_UPLOAD_URL: &str = "https://upload.twitter.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub reddit: RedditConfig,
    pub x: XConfig,
    /// Transport-level timeout applied to every HTTP session
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: SecretString,
    pub client_secret: SecretString,
    /// Only used by authorization-code flows; the password grant ignores it
    pub redirect_uri: String,
    pub user_agent: String,
    pub username: String,
    pub password: SecretString,
    pub auth_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct XConfig {
    pub api_key: SecretString,
    pub api_secret_key: SecretString,
    pub bearer_token: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,
    pub api_url: String,
    pub upload_url: String,
}

impl Config {
    /// Load configuration, pre-loading a dotenv file first
    ///
    /// Uses `env_file` when given, otherwise `./.env` if it exists. Variables
    /// already present in the environment are never overridden.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    ConfigError::EnvFile(format!("{}: {}", path.display(), e))
                })?;
                debug!("Loaded environment from {}", path.display());
            }
            None => {
                let default_path = Path::new(".env");
                if default_path.exists() {
                    dotenvy::from_path(default_path)
                        .map_err(|e| ConfigError::EnvFile(format!(".env: {}", e)))?;
                    debug!("Loaded environment from .env");
                } else {
                    debug!("No .env file found");
                }
            }
        }

        Ok(Self::from_env())
    }

    /// Build configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).unwrap_or_default();
        let secret = |name: &str| SecretString::from(value(name));
        let url = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };

        let http_timeout = lookup("CROSSPOST_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            reddit: RedditConfig {
                client_id: secret("REDDIT_CLIENT_ID"),
                client_secret: secret("REDDIT_CLIENT_SECRET"),
                redirect_uri: value("REDDIT_REDIRECT_URI"),
                user_agent: value("REDDIT_USER_AGENT"),
                username: value("REDDIT_USERNAME"),
                password: secret("REDDIT_PASSWORD"),
                auth_url: url("REDDIT_AUTH_URL", DEFAULT_REDDIT_AUTH_URL),
                api_url: url("REDDIT_API_URL", DEFAULT_REDDIT_API_URL),
            },
            x: XConfig {
                api_key: secret("X_API_KEY"),
                api_secret_key: secret("X_API_SECRET_KEY"),
                bearer_token: secret("X_BEARER_TOKEN"),
                access_token: secret("X_ACCESS_TOKEN"),
                access_token_secret: secret("X_ACCESS_TOKEN_SECRET"),
                api_url: url("X_API_URL", DEFAULT_X_API_URL),
                upload_url: url("X_UPLOAD_URL", DEFAULT_X_UPLOAD_URL),
            },
            http_timeout: Duration::from_secs(http_timeout),
        }
    }
}

impl RedditConfig {
    /// Fail with the first blank credential needed for the password grant
    pub fn require_credentials(&self) -> Result<()> {
        require_secret("REDDIT_CLIENT_ID", &self.client_id)?;
        require_secret("REDDIT_CLIENT_SECRET", &self.client_secret)?;
        require_value("REDDIT_USER_AGENT", &self.user_agent)?;
        require_value("REDDIT_USERNAME", &self.username)?;
        require_secret("REDDIT_PASSWORD", &self.password)?;
        Ok(())
    }
}

impl XConfig {
    /// Credentials for the OAuth1 user context (media upload)
    pub fn require_user_context(&self) -> Result<()> {
        require_secret("X_API_KEY", &self.api_key)?;
        require_secret("X_API_SECRET_KEY", &self.api_secret_key)?;
        require_secret("X_ACCESS_TOKEN", &self.access_token)?;
        require_secret("X_ACCESS_TOKEN_SECRET", &self.access_token_secret)?;
        Ok(())
    }

    /// Whether tweets can be signed in the user context
    pub fn has_user_context(&self) -> bool {
        self.require_user_context().is_ok()
    }
}

fn require_secret(name: &str, value: &SecretString) -> Result<()> {
    require_value(name, value.expose_secret())
}

fn require_value(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(name.to_string()).into());
    }
    Ok(())
}
