//! Provider configuration
//!
//! Credentials and endpoint settings, read from the environment and
//! optionally overridden by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";
pub const ENV_API_KEY: &str = "CLOUDFLARE_API_KEY";
pub const ENV_EMAIL: &str = "CLOUDFLARE_EMAIL";
pub const ENV_BASE_URL: &str = "CLOUDFLARE_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("one of api_token or api_key must be set")]
    MissingCredentials,

    #[error("api_token and api_key cannot both be set")]
    ConflictingCredentials,

    #[error("email is required when using api_key")]
    MissingEmail,
}

/// How requests authenticate against the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// Scoped API token, sent as a bearer token
    Token(&'a str),
    /// Global API key, sent with the account email
    Key { key: &'a str, email: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("carina-provider-cloudflare/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_key: None,
            email: None,
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Build a config from `CLOUDFLARE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            api_token: get(ENV_API_TOKEN),
            api_key: get(ENV_API_KEY),
            email: get(ENV_EMAIL),
            base_url: get(ENV_BASE_URL).unwrap_or_else(default_base_url),
            ..Self::default()
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve which authentication method to use
    pub fn credentials(&self) -> Result<Credentials<'_>, ConfigError> {
        match (self.api_token.as_deref(), self.api_key.as_deref()) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
            (Some(token), None) => Ok(Credentials::Token(token)),
            (None, Some(key)) => {
                let email = self.email.as_deref().ok_or(ConfigError::MissingEmail)?;
                Ok(Credentials::Key { key, email })
            }
            (None, None) => Err(ConfigError::MissingCredentials),
        }
    }
}
