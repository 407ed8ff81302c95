//! Client configuration

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Public KVdb service endpoint
pub const DEFAULT_BASE_URL: &str = "https://kvdb.io";

/// Default request timeout for [`crate::HyperTransport`]
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// How the credential is presented to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// `Authorization: Basic base64("<token>:")`
    #[default]
    Basic,
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `access_token=<token>` appended to every URL
    Query,
}

impl AuthMode {
    /// Wire name used in env vars and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Basic => "basic",
            AuthMode::Bearer => "bearer",
            AuthMode::Query => "query",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthMode::Basic),
            "bearer" => Ok(AuthMode::Bearer),
            "query" => Ok(AuthMode::Query),
            other => Err(Error::Validation(format!(
                "unknown auth type '{}' (expected basic, bearer or query)",
                other
            ))),
        }
    }
}

/// Connection settings for a single bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bucket identifier
    pub bucket: String,
    /// Access token or bucket key; `None` sends requests unauthenticated
    pub token: Option<String>,
    /// How `token` is attached to requests (default: basic)
    pub auth_mode: AuthMode,
    /// Service endpoint (default: https://kvdb.io)
    pub base_url: String,
}

impl ClientConfig {
    /// Config for `bucket` with no credential and the default endpoint
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            token: None,
            auth_mode: AuthMode::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set the credential
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the auth mode
    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    /// Set the service endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load from `KVDB_BUCKET`, `KVDB_TOKEN`, `KVDB_AUTH_TYPE` and `KVDB_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let bucket = env::var("KVDB_BUCKET")
            .map_err(|_| Error::Validation("KVDB_BUCKET environment variable must be set".to_string()))?;
        let token = env::var("KVDB_TOKEN").ok().filter(|t| !t.is_empty());
        let auth_mode = match env::var("KVDB_AUTH_TYPE") {
            Ok(s) if !s.trim().is_empty() => s.parse()?,
            _ => AuthMode::default(),
        };
        let base_url = env::var("KVDB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(ClientConfig {
            bucket,
            token,
            auth_mode,
            base_url,
        })
    }

    /// Check the bucket and endpoint, returning a copy with the endpoint normalized
    pub(crate) fn validated(mut self) -> Result<Self> {
        if self.bucket.trim().is_empty() {
            return Err(Error::Validation("bucket is required".to_string()));
        }

        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "base URL must use http:// or https://, got '{}'",
                self.base_url
            )));
        }

        self.base_url = normalize_base_url(&self.base_url).to_string();
        if self.token.as_deref() == Some("") {
            self.token = None;
        }
        Ok(self)
    }
}

/// Strip a single trailing slash so paths can be joined by concatenation
pub fn normalize_base_url(base_url: &str) -> &str {
    base_url.strip_suffix('/').unwrap_or(base_url)
}

/// Settings for the bundled hyper transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout in milliseconds; 0 disables it (default: 30000)
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Load `KVDB_TIMEOUT_MS`, falling back to the default on absent or invalid values
    pub fn from_env() -> Self {
        let timeout_ms = env::var("KVDB_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self { timeout_ms }
    }
}
