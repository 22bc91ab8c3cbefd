//! Client configuration
//!
//! [`AppleConfig`] controls where requests go and how the default transport
//! behaves. It deserializes from any serde format, with every field optional:
//!
//! ```rust
//! use apple_signin_auth::AppleConfig;
//!
//! let config: AppleConfig = serde_json::from_str(r#"{ "request_timeout_secs": 5 }"#).unwrap();
//! assert_eq!(config.endpoint_url, "https://appleid.apple.com");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppleAuthError, Result};

/// Base URL of Apple's identity service
pub const APPLE_ENDPOINT_URL: &str = "https://appleid.apple.com";

/// Issuer of every token Apple signs, and the audience of client secrets
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// Path of the authorization endpoint
pub const AUTHORIZE_PATH: &str = "/auth/authorize";
/// Path of the token endpoint
pub const TOKEN_PATH: &str = "/auth/token";
/// Path of the revocation endpoint
pub const REVOKE_PATH: &str = "/auth/revoke";
/// Path of the published signing keys
pub const KEYS_PATH: &str = "/auth/keys";

/// Sign in with Apple client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleConfig {
    /// Base URL for all endpoints (override for proxies or mock servers)
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Request timeout for the default transport, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// User agent sent by the default transport
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_endpoint_url() -> String {
    APPLE_ENDPOINT_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppleConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: None,
        }
    }
}

impl AppleConfig {
    /// Point every endpoint at a different base URL
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    /// Set the default transport's request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidInput`] if `endpoint_url` is not an absolute
    /// http(s) URL.
    pub fn validate(&self) -> Result<()> {
        self.base_url().map(|_| ())
    }

    /// Resolve an endpoint path (e.g. [`TOKEN_PATH`]) against the base URL
    ///
    /// A path prefix on the base URL is kept, so `https://proxy.example/apple`
    /// resolves `/auth/keys` to `https://proxy.example/apple/auth/keys`.
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidInput`] if `endpoint_url` is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url()?;
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        Ok(url)
    }

    fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint_url).map_err(|e| {
            AppleAuthError::invalid_input(format!(
                "endpoint_url '{}' is not a valid URL: {e}",
                self.endpoint_url
            ))
        })?;

        if !matches!(url.scheme(), "https" | "http") {
            return Err(AppleAuthError::invalid_input(format!(
                "endpoint_url '{}' must use http or https",
                self.endpoint_url
            )));
        }

        Ok(url)
    }
}
