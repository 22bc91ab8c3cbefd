//! The [`AppleClient`] facade
//!
//! Wires configuration, transport, key cache, key resolution and verification
//! together. Each client owns its own [`KeyCache`]; callers that want one
//! process-wide cache use [`AppleClient::shared`].

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::authorize::{self, AuthorizationUrlOptions};
use crate::claims::{IdentityTokenClaims, WebhookTokenClaims};
use crate::client_secret::{self, ClientSecretOptions};
use crate::config::{AppleConfig, KEYS_PATH};
use crate::error::Result;
use crate::keys::{ApplePublicKey, CachingKeyResolver, FetchOptions, KeyCache, KeySetFetcher};
use crate::token::{
    self, AuthorizationTokenOptions, RefreshTokenOptions, RevokeResponse, RevokeTokenOptions,
    TokenResponse,
};
use crate::transport::{HttpTransport, ReqwestTransport, TransportHandle};
use crate::verify::{TokenVerifier, VerifyOptions};

static SHARED: OnceCell<AppleClient> = OnceCell::new();

/// Sign in with Apple client
///
/// Cloning is cheap; clones share the transport slot and key cache.
#[derive(Debug, Clone)]
pub struct AppleClient {
    config: AppleConfig,
    transport: TransportHandle,
    cache: Arc<KeyCache>,
    fetcher: Arc<KeySetFetcher>,
    verifier: TokenVerifier,
}

impl AppleClient {
    /// Create a client using the default reqwest transport
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidInput`](crate::AppleAuthError::InvalidInput) if the
    /// configuration is invalid, [`AppleAuthError::Http`](crate::AppleAuthError::Http) if the
    /// HTTP client cannot be built.
    pub fn new(config: AppleConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::assemble(config, Arc::new(transport))
    }

    /// Create a client that sends every request through `transport`
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidInput`](crate::AppleAuthError::InvalidInput) if the
    /// configuration is invalid.
    pub fn with_transport(config: AppleConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        Self::assemble(config, transport)
    }

    /// Lazily constructed process-wide client with the default configuration
    ///
    /// Built on first use; every caller shares its key cache and transport slot.
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::Http`](crate::AppleAuthError::Http) if the HTTP client
    /// cannot be built. A later call retries construction.
    pub fn shared() -> Result<&'static AppleClient> {
        SHARED.get_or_try_init(|| Self::new(AppleConfig::default()))
    }

    fn assemble(config: AppleConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let keys_url = config.endpoint(KEYS_PATH)?;
        let transport = TransportHandle::new(transport);
        let cache = Arc::new(KeyCache::new());

        let fetcher = Arc::new(KeySetFetcher::new(
            keys_url,
            transport.clone(),
            Arc::clone(&cache),
        ));
        let verifier = TokenVerifier::new(Arc::new(CachingKeyResolver::new(Arc::clone(&fetcher))));

        info!(endpoint = %config.endpoint_url, "Sign in with Apple client initialized");

        Ok(Self {
            config,
            transport,
            cache,
            fetcher,
            verifier,
        })
    }

    /// Replace the transport for all subsequent calls, on this client and its clones
    pub fn set_transport(&self, transport: Arc<dyn HttpTransport>) {
        self.transport.replace(transport);
    }

    /// The client configuration
    pub fn config(&self) -> &AppleConfig {
        &self.config
    }

    /// The signing key cache, for inspection
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// The token verifier backed by this client's key cache
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Build the URL to send users to for signing in
    ///
    /// # Errors
    ///
    /// See [`authorize::authorization_url`].
    pub fn authorization_url(&self, options: &AuthorizationUrlOptions) -> Result<String> {
        authorize::authorization_url(&self.config, options)
    }

    /// Create a signed client secret
    ///
    /// # Errors
    ///
    /// See [`client_secret::create_client_secret`].
    pub fn client_secret(&self, options: &ClientSecretOptions) -> Result<String> {
        client_secret::create_client_secret(options)
    }

    /// Exchange an authorization code for tokens
    ///
    /// Apple's error documents are returned as [`EndpointResponse::Error`](crate::EndpointResponse::Error),
    /// not as errors.
    ///
    /// # Errors
    ///
    /// Returns an error for empty credentials, transport failures, or a
    /// non-JSON response body.
    pub async fn authorization_token(
        &self,
        code: &str,
        options: &AuthorizationTokenOptions,
    ) -> Result<TokenResponse> {
        token::exchange_code(&self.config, &self.transport, code, options)
            .await
    }

    /// Obtain a new access token with a refresh token
    ///
    /// # Errors
    ///
    /// As [`authorization_token`](Self::authorization_token).
    pub async fn refresh_authorization_token(
        &self,
        refresh_token: &str,
        options: &RefreshTokenOptions,
    ) -> Result<TokenResponse> {
        token::refresh_token(&self.config, &self.transport, refresh_token, options)
            .await
    }

    /// Revoke a refresh or access token
    ///
    /// A successful revocation yields [`EndpointResponse::Empty`](crate::EndpointResponse::Empty).
    ///
    /// # Errors
    ///
    /// As [`authorization_token`](Self::authorization_token).
    pub async fn revoke_authorization_token(
        &self,
        token: &str,
        options: &RevokeTokenOptions,
    ) -> Result<RevokeResponse> {
        token::revoke_token(&self.config, &self.transport, token, options)
            .await
    }

    /// Fetch Apple's current signing keys
    ///
    /// # Errors
    ///
    /// See [`KeySetFetcher::fetch`].
    pub async fn apple_public_keys(&self, options: FetchOptions) -> Result<Vec<ApplePublicKey>> {
        self.fetcher.fetch(options).await
    }

    /// Verify an identity token
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_id_token`].
    pub async fn verify_id_token(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<IdentityTokenClaims> {
        self.verifier.verify_id_token(token, options).await
    }

    /// Verify a server-to-server notification token
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_webhook_token`].
    pub async fn verify_webhook_token(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<WebhookTokenClaims> {
        self.verifier.verify_webhook_token(token, options).await
    }
}
