//! Verification of Apple-signed tokens
//!
//! [`TokenVerifier`] checks identity tokens and server-to-server notification
//! (webhook) tokens:
//! - Algorithm validation (RS256 unless overridden), before any key lookup
//! - Key resolution by the header's `kid` through a [`KeyResolver`]
//! - Signature verification
//! - Issuer validation (`https://appleid.apple.com` unless overridden)
//! - Expiry, and audience / nonce when configured
//!
//! Webhook tokens additionally have their `events` claim decoded, but only
//! after every check above has passed.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, TokenData, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::claims::{IdentityTokenClaims, RawWebhookTokenClaims, WebhookTokenClaims};
use crate::config::APPLE_ISSUER;
use crate::error::{AppleAuthError, Result};
use crate::keys::KeyResolver;

/// Algorithm Apple signs identity and webhook tokens with
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Caller overrides for token verification
///
/// Unset fields fall back to the defaults: algorithm [`DEFAULT_ALGORITHM`],
/// issuer [`APPLE_ISSUER`], no audience check, no clock tolerance, no nonce check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    /// Allowed signing algorithms
    pub algorithms: Option<Vec<Algorithm>>,
    /// Expected `iss`
    pub issuer: Option<String>,
    /// Accepted `aud` values (your client ids)
    pub audience: Option<Vec<String>>,
    /// Clock tolerance in seconds for `exp`/`nbf`
    pub leeway_secs: Option<u64>,
    /// Expected `nonce` (identity tokens only)
    pub nonce: Option<String>,
}

impl VerifyOptions {
    /// Require `aud` to be one of `audience`
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = Some(audience.into_iter().map(Into::into).collect());
        self
    }

    /// Expect a different issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Allow a different set of algorithms
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = Some(algorithms);
        self
    }

    /// Tolerate this much clock skew
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = Some(leeway_secs);
        self
    }

    /// Require the identity token's `nonce` to equal `nonce`
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    fn algorithms(&self) -> Vec<Algorithm> {
        match &self.algorithms {
            Some(algorithms) if !algorithms.is_empty() => algorithms.clone(),
            _ => vec![DEFAULT_ALGORITHM],
        }
    }

    fn issuer(&self) -> &str {
        self.issuer.as_deref().unwrap_or(APPLE_ISSUER)
    }

    /// Validation rules for a token signed with `algorithm`
    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[self.issuer()]);
        validation.leeway = self.leeway_secs.unwrap_or(0);
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "iss".to_string()]);

        match &self.audience {
            Some(audience) if !audience.is_empty() => validation.set_audience(audience),
            _ => validation.validate_aud = false,
        }

        validation
    }
}

/// Verifies tokens signed with Apple's rotating keys
#[derive(Clone)]
pub struct TokenVerifier {
    resolver: Arc<dyn KeyResolver>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("resolver", &"<dyn KeyResolver>")
            .finish()
    }
}

impl TokenVerifier {
    /// Create a verifier that looks keys up through `resolver`
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self { resolver }
    }

    /// Verify an identity token and return its claims
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Token is malformed or has no `kid` ([`AppleAuthError::MalformedToken`], [`AppleAuthError::MissingKeyId`])
    /// - Algorithm not allowed ([`AppleAuthError::AlgorithmMismatch`])
    /// - Key cannot be resolved ([`AppleAuthError::UnknownKeyId`] or the key set fetch error)
    /// - Signature is invalid ([`AppleAuthError::InvalidSignature`])
    /// - Issuer, audience or nonce don't match
    /// - Token is expired ([`AppleAuthError::Expired`])
    pub async fn verify_id_token(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<IdentityTokenClaims> {
        let claims: IdentityTokenClaims = self.verify(token, options).await?;

        if let Some(expected) = &options.nonce
            && claims.nonce.as_deref() != Some(expected.as_str())
        {
            warn!(subject = %claims.sub, "Identity token nonce mismatch");
            return Err(AppleAuthError::NonceMismatch);
        }

        debug!(subject = %claims.sub, "Identity token verified");
        Ok(claims)
    }

    /// Verify a server-to-server notification token and decode its event
    ///
    /// # Errors
    ///
    /// Everything [`verify_id_token`](Self::verify_id_token) can return, plus
    /// [`AppleAuthError::MalformedEvents`] if the verified `events` claim is not
    /// a valid event document.
    pub async fn verify_webhook_token(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<WebhookTokenClaims> {
        let raw: RawWebhookTokenClaims = self.verify(token, options).await?;

        let claims = raw.decode_events().map_err(|e| {
            warn!(error = %e, "Verified webhook token carries malformed events");
            e
        })?;

        debug!(
            jti = %claims.jti,
            event_type = ?claims.events.event_type,
            "Webhook token verified"
        );
        Ok(claims)
    }

    async fn verify<T>(&self, token: &str, options: &VerifyOptions) -> Result<T>
    where
        T: DeserializeOwned + Clone,
    {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            AppleAuthError::MalformedToken(e.to_string())
        })?;

        let allowed = options.algorithms();
        if !allowed.contains(&header.alg) {
            warn!(
                algorithm = ?header.alg,
                allowed = ?allowed,
                "Token algorithm not allowed"
            );
            return Err(AppleAuthError::AlgorithmMismatch(header.alg));
        }

        let kid = header.kid.ok_or_else(|| {
            warn!("Token header missing kid");
            AppleAuthError::MissingKeyId
        })?;

        let key = self.resolver.resolve(&kid).await?;

        let validation = options.validation(header.alg);
        let data: TokenData<T> = decode(token, key.decoding_key(), &validation).map_err(|e| {
            warn!(kid = %kid, issuer = %options.issuer(), error = %e, "Token validation failed");
            AppleAuthError::from_jwt(e, header.alg)
        })?;

        Ok(data.claims)
    }
}
