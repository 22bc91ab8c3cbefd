//! Token endpoint calls
//!
//! Exchange an authorization code, refresh an access token, and revoke a
//! token. All three POST a form body authenticated with a client secret
//! (see [`crate::client_secret`]).
//!
//! Responses are classified by body, not by HTTP status, into an
//! [`EndpointResponse`]:
//! - empty body → [`EndpointResponse::Empty`] (revocation answers this way)
//! - JSON with a string `error` member → [`EndpointResponse::Error`]
//! - any other JSON → [`EndpointResponse::Success`]
//!
//! A body that is not JSON at all is an [`AppleAuthError::InvalidResponse`].

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::{AppleConfig, REVOKE_PATH, TOKEN_PATH};
use crate::error::{AppleAuthError, Result};
use crate::transport::{self, TransportHandle};

/// Which kind of token is being revoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// A refresh token
    #[default]
    RefreshToken,
    /// An access token
    AccessToken,
}

impl TokenTypeHint {
    /// Wire value of the hint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshToken => "refresh_token",
            Self::AccessToken => "access_token",
        }
    }
}

impl fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful token endpoint response
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationTokenResponse {
    /// Access token (currently unused by Apple's public APIs)
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token; only returned by the code exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Identity token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl fmt::Debug for AuthorizationTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Error document returned by Apple's endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleErrorResponse {
    /// Error code, e.g. `invalid_client` or `invalid_grant`
    pub error: String,
    /// Human readable description, when Apple sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Outcome of a token or revoke call that reached Apple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointResponse<T> {
    /// Empty body
    Empty,
    /// Success document
    Success(T),
    /// Apple's error document
    Error(AppleErrorResponse),
}

impl<T> EndpointResponse<T> {
    /// Whether Apple answered with an error document
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The success document, if any
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The error document, if any
    pub fn error(&self) -> Option<&AppleErrorResponse> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Response of the code exchange and refresh calls
pub type TokenResponse = EndpointResponse<AuthorizationTokenResponse>;

/// Response of the revoke call; Apple answers a successful revocation with an empty body
pub type RevokeResponse = EndpointResponse<serde_json::Value>;

/// Inputs for exchanging an authorization code
#[derive(Clone, Deserialize)]
pub struct AuthorizationTokenOptions {
    /// Services ID or app bundle id
    #[serde(alias = "clientID")]
    pub client_id: String,
    /// Client secret from [`create_client_secret`](crate::client_secret::create_client_secret)
    #[serde(alias = "clientSecret")]
    pub client_secret: SecretString,
    /// Redirect URI used in the authorization request, if any
    #[serde(default, alias = "redirectUri")]
    pub redirect_uri: Option<String>,
    /// PKCE code verifier
    #[serde(default, alias = "codeVerifier")]
    pub code_verifier: Option<String>,
}

impl AuthorizationTokenOptions {
    /// Options authenticated as `client_id` with `client_secret`
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            redirect_uri: None,
            code_verifier: None,
        }
    }

    /// Send the redirect URI used in the authorization request
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Send a PKCE code verifier
    pub fn with_code_verifier(mut self, code_verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(code_verifier.into());
        self
    }
}

impl fmt::Debug for AuthorizationTokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationTokenOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field(
                "code_verifier",
                &self.code_verifier.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Inputs for refreshing a token
#[derive(Clone, Deserialize)]
pub struct RefreshTokenOptions {
    /// Services ID or app bundle id
    #[serde(alias = "clientID")]
    pub client_id: String,
    /// Client secret
    #[serde(alias = "clientSecret")]
    pub client_secret: SecretString,
}

impl RefreshTokenOptions {
    /// Options authenticated as `client_id` with `client_secret`
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

impl fmt::Debug for RefreshTokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Inputs for revoking a token
#[derive(Clone, Deserialize)]
pub struct RevokeTokenOptions {
    /// Services ID or app bundle id
    #[serde(alias = "clientID")]
    pub client_id: String,
    /// Client secret
    #[serde(alias = "clientSecret")]
    pub client_secret: SecretString,
    /// Kind of token being revoked
    #[serde(default, alias = "tokenTypeHint")]
    pub token_type_hint: TokenTypeHint,
}

impl RevokeTokenOptions {
    /// Options authenticated as `client_id` with `client_secret`
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_type_hint: TokenTypeHint,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            token_type_hint,
        }
    }
}

impl fmt::Debug for RevokeTokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevokeTokenOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_type_hint", &self.token_type_hint)
            .finish()
    }
}

fn check_credentials(client_id: &str, client_secret: &SecretString) -> Result<()> {
    if client_id.is_empty() {
        return Err(AppleAuthError::invalid_input("client_id is empty"));
    }
    if client_secret.expose_secret().is_empty() {
        return Err(AppleAuthError::invalid_input("client_secret is empty"));
    }
    Ok(())
}

/// Exchange an authorization code for tokens
pub(crate) async fn exchange_code(
    config: &AppleConfig,
    transport: &TransportHandle,
    code: &str,
    options: &AuthorizationTokenOptions,
) -> Result<TokenResponse> {
    check_credentials(&options.client_id, &options.client_secret)?;
    let url = config.endpoint(TOKEN_PATH)?;

    let mut params = vec![
        ("client_id", options.client_id.as_str()),
        (
            "client_secret",
            options.client_secret.expose_secret().as_str(),
        ),
        ("code", code),
        ("grant_type", "authorization_code"),
    ];
    if let Some(redirect_uri) = options.redirect_uri.as_deref().filter(|r| !r.is_empty()) {
        params.push(("redirect_uri", redirect_uri));
    }
    if let Some(verifier) = options.code_verifier.as_deref().filter(|v| !v.is_empty()) {
        params.push(("code_verifier", verifier));
    }

    debug!(client_id = %options.client_id, "Exchanging authorization code");
    post_form(transport, &url, &params).await
}

/// Obtain a fresh access token with a refresh token
pub(crate) async fn refresh_token(
    config: &AppleConfig,
    transport: &TransportHandle,
    refresh_token: &str,
    options: &RefreshTokenOptions,
) -> Result<TokenResponse> {
    check_credentials(&options.client_id, &options.client_secret)?;
    let url = config.endpoint(TOKEN_PATH)?;

    let params = [
        ("client_id", options.client_id.as_str()),
        (
            "client_secret",
            options.client_secret.expose_secret().as_str(),
        ),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    debug!(client_id = %options.client_id, "Refreshing authorization token");
    post_form(transport, &url, &params).await
}

/// Revoke a refresh or access token
pub(crate) async fn revoke_token(
    config: &AppleConfig,
    transport: &TransportHandle,
    token: &str,
    options: &RevokeTokenOptions,
) -> Result<RevokeResponse> {
    check_credentials(&options.client_id, &options.client_secret)?;
    let url = config.endpoint(REVOKE_PATH)?;

    let params = [
        ("client_id", options.client_id.as_str()),
        (
            "client_secret",
            options.client_secret.expose_secret().as_str(),
        ),
        ("token", token),
        ("token_type_hint", options.token_type_hint.as_str()),
    ];

    debug!(
        client_id = %options.client_id,
        token_type_hint = %options.token_type_hint,
        "Revoking authorization token"
    );
    post_form(transport, &url, &params).await
}

async fn post_form<T: DeserializeOwned>(
    transport: &TransportHandle,
    url: &Url,
    params: &[(&str, &str)],
) -> Result<EndpointResponse<T>> {
    let request = transport::form_post(url, params)?;
    let response = transport.execute(request).await.map_err(|e| {
        error!(endpoint = %url, error = %e, "Token endpoint request failed");
        e
    })?;

    debug!(endpoint = %url, status = %response.status(), "Token endpoint responded");
    parse_endpoint_response(url, response.body())
}

/// Classify a token or revoke endpoint body
pub(crate) fn parse_endpoint_response<T: DeserializeOwned>(
    url: &Url,
    body: &[u8],
) -> Result<EndpointResponse<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(EndpointResponse::Empty);
    }

    let invalid = |source| AppleAuthError::InvalidResponse {
        endpoint: url.to_string(),
        source,
    };

    let value: serde_json::Value = serde_json::from_slice(body).map_err(invalid)?;

    if value.get("error").is_some_and(serde_json::Value::is_string) {
        let error: AppleErrorResponse = serde_json::from_value(value).map_err(invalid)?;
        warn!(endpoint = %url, error = %error.error, "Apple returned an error response");
        return Ok(EndpointResponse::Error(error));
    }

    serde_json::from_value(value)
        .map(EndpointResponse::Success)
        .map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn token_url() -> Url {
        Url::parse("https://appleid.apple.com/auth/token").unwrap()
    }

    /// Records the last request and answers with a fixed body
    struct Recorder {
        body: Vec<u8>,
        last: Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            let body = String::from_utf8(request.body().clone()).unwrap();
            *self.last.lock() = Some((request.uri().path().to_string(), body));
            Ok(http::Response::builder()
                .status(200)
                .body(self.body.clone())
                .unwrap())
        }
    }

    fn recorder(body: &[u8]) -> (TransportHandle, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            body: body.to_vec(),
            last: Mutex::new(None),
        });
        (TransportHandle::new(recorder.clone()), recorder)
    }

    #[test]
    fn test_empty_body() {
        let parsed: RevokeResponse = parse_endpoint_response(&token_url(), b"").unwrap();
        assert_eq!(parsed, EndpointResponse::Empty);
    }

    #[test]
    fn test_error_body() {
        let body = br#"{"error":"invalid_client"}"#;
        let parsed: TokenResponse = parse_endpoint_response(&token_url(), body).unwrap();
        assert_eq!(parsed.error().unwrap().error, "invalid_client");
        assert!(parsed.is_error());
    }

    #[test]
    fn test_success_body() {
        let parsed: TokenResponse = parse_endpoint_response(
            &token_url(),
            br#"{"access_token":"a","token_type":"bearer","expires_in":3600,"id_token":"x.y.z"}"#,
        )
        .unwrap();

        let response = parsed.success().unwrap();
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.id_token.as_deref(), Some("x.y.z"));
    }

    #[test]
    fn test_non_json_body() {
        let err = parse_endpoint_response::<AuthorizationTokenResponse>(&token_url(), b"<html>")
            .unwrap_err();
        assert!(matches!(err, AppleAuthError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_exchange_code_form_body() {
        let (handle, recorder) = recorder(br#"{"error":"invalid_grant"}"#);
        let options = AuthorizationTokenOptions::new("com.example.app", "secret")
            .with_redirect_uri("https://example.com/cb")
            .with_code_verifier("verifier");

        let response = exchange_code(&AppleConfig::default(), &handle, "c0de", &options)
            .await
            .unwrap();

        assert!(response.is_error());
        let (path, body) = recorder.last.lock().clone().unwrap();
        assert_eq!(path, "/auth/token");
        assert_eq!(
            body,
            "client_id=com.example.app&client_secret=secret&code=c0de&grant_type=authorization_code\
             &redirect_uri=https%3A%2F%2Fexample.com%2Fcb&code_verifier=verifier"
        );
    }

    #[tokio::test]
    async fn test_revoke_form_body() {
        let (handle, recorder) = recorder(b"");
        let options =
            RevokeTokenOptions::new("com.example.app", "secret", TokenTypeHint::AccessToken);

        let response = revoke_token(&AppleConfig::default(), &handle, "tok", &options)
            .await
            .unwrap();

        assert_eq!(response, EndpointResponse::Empty);
        let (path, body) = recorder.last.lock().clone().unwrap();
        assert_eq!(path, "/auth/revoke");
        assert_eq!(
            body,
            "client_id=com.example.app&client_secret=secret&token=tok&token_type_hint=access_token"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_network() {
        let (handle, recorder) = recorder(b"");

        let err = refresh_token(
            &AppleConfig::default(),
            &handle,
            "rt",
            &RefreshTokenOptions::new("com.example.app", ""),
        )
        .await
        .unwrap_err();

        match err {
            AppleAuthError::InvalidInput(message) => assert!(message.contains("client_secret")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(recorder.last.lock().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let options = RefreshTokenOptions::new("com.example.app", "s3cr3t");
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("s3cr3t"));
    }
}
