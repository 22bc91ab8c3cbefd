//! Client secret (client assertion) signing
//!
//! Apple's token and revocation endpoints authenticate the caller with a
//! short-lived ES256 JWT signed by a private key downloaded from the Apple
//! developer portal:
//!
//! | claim | value |
//! |-------|-------|
//! | `iss` | team id |
//! | `sub` | client id (Services ID or bundle id) |
//! | `aud` | `https://appleid.apple.com` |
//! | `iat` | now |
//! | `exp` | now + `exp_after` (default 300 seconds) |
//!
//! The header carries `kid` = the key identifier of that private key.
//!
//! # Legacy `teamId`
//!
//! Options deserialized from configuration accept `team_id` / `teamID`, and,
//! for compatibility with older configuration files, `teamId`. The legacy key
//! is folded into `team_id` by [`ClientSecretOptions::normalize`] and logs a
//! deprecation warning; it will stop being accepted in the next major version.

use std::fmt;
use std::path::{Path, PathBuf};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::APPLE_ISSUER;
use crate::error::{AppleAuthError, Result};

/// Default lifetime of a client secret, in seconds
pub const DEFAULT_EXP_AFTER_SECS: u64 = 300;

/// Claims of a client secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecretClaims {
    /// Team id
    pub iss: String,
    /// Issue time, seconds since the Unix epoch
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
    /// Always `https://appleid.apple.com`
    pub aud: String,
    /// Client id
    pub sub: String,
}

/// Inputs for [`create_client_secret`]
///
/// Exactly one of `private_key` and `private_key_path` must be set.
#[derive(Clone, Default, Deserialize)]
pub struct ClientSecretOptions {
    /// Services ID or app bundle id
    #[serde(default, alias = "clientID")]
    pub client_id: String,
    /// Apple developer team id
    #[serde(default, alias = "teamID")]
    pub team_id: String,
    /// Legacy spelling of `team_id`, see the module docs
    #[serde(default, rename = "teamId")]
    pub legacy_team_id: Option<String>,
    /// Identifier of the private key
    #[serde(default, alias = "keyIdentifier")]
    pub key_identifier: String,
    /// PEM-encoded (PKCS#8) P-256 private key
    #[serde(default, alias = "privateKey")]
    pub private_key: Option<SecretString>,
    /// Path to the `.p8` private key file
    #[serde(default, alias = "privateKeyPath")]
    pub private_key_path: Option<PathBuf>,
    /// Lifetime of the secret in seconds (default 300)
    #[serde(default, alias = "expAfter")]
    pub exp_after: Option<u64>,
}

impl ClientSecretOptions {
    /// Options for `client_id` signed on behalf of `team_id` with key `key_identifier`
    pub fn new(
        client_id: impl Into<String>,
        team_id: impl Into<String>,
        key_identifier: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            team_id: team_id.into(),
            key_identifier: key_identifier.into(),
            ..Self::default()
        }
    }

    /// Sign with a PEM private key held in memory
    pub fn with_private_key(mut self, pem: impl Into<String>) -> Self {
        self.private_key = Some(SecretString::new(pem.into()));
        self
    }

    /// Sign with the private key stored at `path`
    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Set the lifetime of the secret
    pub fn with_exp_after(mut self, seconds: u64) -> Self {
        self.exp_after = Some(seconds);
        self
    }

    /// Fold the legacy `teamId` into `team_id`
    ///
    /// `team_id` wins when both are set.
    pub fn normalize(mut self) -> Self {
        if let Some(legacy) = self.legacy_team_id.take()
            && !legacy.is_empty()
        {
            warn!("`teamId` is deprecated, use `teamID` / `team_id` instead");
            if self.team_id.is_empty() {
                self.team_id = legacy;
            }
        }
        self
    }

    fn exp_after(&self) -> i64 {
        let seconds = self
            .exp_after
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_EXP_AFTER_SECS);
        i64::try_from(seconds).unwrap_or(i64::MAX)
    }

    /// Check the options without touching the private key
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidInput`] for missing or conflicting
    /// fields, [`AppleAuthError::PrivateKeyNotFound`] if `private_key_path`
    /// does not exist.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(AppleAuthError::invalid_input("client_id is empty"));
        }
        if self.team_id.is_empty() {
            return Err(AppleAuthError::invalid_input("team_id is empty"));
        }
        if self.key_identifier.is_empty() {
            return Err(AppleAuthError::invalid_input("key_identifier is empty"));
        }

        match (self.inline_key(), self.key_path()) {
            (None, None) => Err(AppleAuthError::invalid_input(
                "private_key and private_key_path are empty",
            )),
            (Some(_), Some(_)) => Err(AppleAuthError::invalid_input(
                "private_key and private_key_path cannot be passed together, choose one of them",
            )),
            (None, Some(path)) if !path.exists() => {
                Err(AppleAuthError::PrivateKeyNotFound(path.to_path_buf()))
            }
            _ => Ok(()),
        }
    }

    /// The inline key, unless blank
    fn inline_key(&self) -> Option<&str> {
        self.private_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|pem| !pem.trim().is_empty())
    }

    /// The key path, unless empty
    fn key_path(&self) -> Option<&Path> {
        self.private_key_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    fn private_key_pem(&self) -> Result<Vec<u8>> {
        match (self.inline_key(), self.key_path()) {
            (Some(pem), _) => Ok(pem.as_bytes().to_vec()),
            (None, Some(path)) => read_private_key(path),
            (None, None) => Err(AppleAuthError::invalid_input(
                "private_key and private_key_path are empty",
            )),
        }
    }
}

impl fmt::Debug for ClientSecretOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretOptions")
            .field("client_id", &self.client_id)
            .field("team_id", &self.team_id)
            .field("legacy_team_id", &self.legacy_team_id)
            .field("key_identifier", &self.key_identifier)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("private_key_path", &self.private_key_path)
            .field("exp_after", &self.exp_after)
            .finish()
    }
}

fn read_private_key(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppleAuthError::PrivateKeyNotFound(path.to_path_buf())
        } else {
            AppleAuthError::PrivateKeyRead(e)
        }
    })
}

/// Create a signed client secret
///
/// All input checks run before the private key is read or used.
///
/// # Errors
///
/// - [`AppleAuthError::InvalidInput`] / [`AppleAuthError::PrivateKeyNotFound`] from validation
/// - [`AppleAuthError::PrivateKeyRead`] if the key file can't be read
/// - [`AppleAuthError::Signing`] if the key is not a valid P-256 PEM key
pub fn create_client_secret(options: &ClientSecretOptions) -> Result<String> {
    let options = options.clone().normalize();
    options.validate()?;

    let issued_at = chrono::Utc::now().timestamp();
    let claims = ClientSecretClaims {
        iss: options.team_id.clone(),
        iat: issued_at,
        exp: issued_at.saturating_add(options.exp_after()),
        aud: APPLE_ISSUER.to_string(),
        sub: options.client_id.clone(),
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(options.key_identifier.clone());

    let pem = options.private_key_pem()?;
    let key = EncodingKey::from_ec_pem(&pem)
        .map_err(AppleAuthError::Signing)?;
    let secret = encode(&header, &claims, &key)
        .map_err(AppleAuthError::Signing)?;

    debug!(
        client_id = %claims.sub,
        team_id = %claims.iss,
        exp = claims.exp,
        "Client secret created"
    );

    Ok(secret)
}
