//! Authorization URL construction
//!
//! Builds the URL users are redirected to in order to sign in. No network
//! access is involved.
//!
//! Whenever the requested scope includes `email`, Apple requires the result to
//! be POSTed back, so `response_mode` is forced to `form_post` regardless of
//! what was asked for.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AUTHORIZE_PATH, AppleConfig};
use crate::error::{AppleAuthError, Result};

/// `state` sent when the caller does not supply one
pub const DEFAULT_STATE: &str = "state";

/// How Apple returns the authorization result to the redirect URI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Query string of a GET redirect
    #[default]
    Query,
    /// URL fragment
    Fragment,
    /// Form body of a POST to the redirect URI
    FormPost,
}

impl ResponseMode {
    /// Wire value of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::FormPost => "form_post",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for [`authorization_url`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationUrlOptions {
    /// Services ID or app bundle id
    #[serde(alias = "clientID")]
    pub client_id: String,
    /// Where Apple sends the user back to
    #[serde(alias = "redirectUri")]
    pub redirect_uri: String,
    /// Requested response mode; overridden to `form_post` when scope contains `email`
    #[serde(default, alias = "responseMode")]
    pub response_mode: Option<ResponseMode>,
    /// Opaque value echoed back to the redirect URI (default `"state"`)
    #[serde(default)]
    pub state: Option<String>,
    /// Additional scopes, e.g. `"name email"`; `openid` is always prepended
    #[serde(default)]
    pub scope: Option<String>,
    /// Value echoed back in the identity token's `nonce` claim
    #[serde(default)]
    pub nonce: Option<String>,
}

impl AuthorizationUrlOptions {
    /// Options for `client_id` redirecting to `redirect_uri`
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    /// Request a response mode
    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = Some(response_mode);
        self
    }

    /// Set the `state` value
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Request additional scopes
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the `nonce` value
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    fn scope(&self) -> String {
        match self.scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => format!("openid {scope}"),
            _ => "openid".to_string(),
        }
    }

    fn response_mode(&self) -> Option<ResponseMode> {
        let requests_email = self
            .scope
            .as_deref()
            .is_some_and(|scope| scope.contains("email"));

        if requests_email {
            Some(ResponseMode::FormPost)
        } else {
            self.response_mode
        }
    }
}

/// Build the authorization URL
///
/// # Errors
///
/// Returns [`AppleAuthError::InvalidInput`] if `client_id` or `redirect_uri`
/// is empty, or if the configured endpoint URL is invalid.
pub fn authorization_url(
    config: &AppleConfig,
    options: &AuthorizationUrlOptions,
) -> Result<String> {
    if options.client_id.is_empty() {
        return Err(AppleAuthError::invalid_input("client_id is empty"));
    }
    if options.redirect_uri.is_empty() {
        return Err(AppleAuthError::invalid_input("redirect_uri is empty"));
    }

    let mut url = config.endpoint(AUTHORIZE_PATH)?;
    let state = options
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATE);

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("state", state)
            .append_pair("client_id", &options.client_id)
            .append_pair("redirect_uri", &options.redirect_uri)
            .append_pair("scope", &options.scope());

        if let Some(mode) = options.response_mode() {
            query.append_pair("response_mode", mode.as_str());
        }
        if let Some(nonce) = options.nonce.as_deref().filter(|n| !n.is_empty()) {
            query.append_pair("nonce", nonce);
        }
    }

    debug!(
        client_id = %options.client_id,
        response_mode = ?options.response_mode(),
        "Authorization URL built"
    );

    Ok(url.into())
}
