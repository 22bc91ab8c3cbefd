//! Claims carried by Apple-issued tokens
//!
//! Apple is inconsistent about some boolean claims: `email_verified` and
//! `is_private_email` arrive either as JSON booleans or as the strings
//! `"true"`/`"false"`, depending on the API version. They are kept as received
//! in a [`ClaimFlag`], and normalized only when the caller asks for a `bool`.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{AppleAuthError, Result};

/// A boolean claim that may arrive as a JSON bool or as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimFlag {
    /// Sent as a JSON boolean
    Bool(bool),
    /// Sent as a string, usually `"true"` or `"false"`
    Text(String),
}

impl ClaimFlag {
    /// Normalize to a `bool`
    ///
    /// Returns `None` for strings other than `"true"`/`"false"`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Text(text) => match text.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }

    /// `true` only if the flag normalizes to `true`
    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }
}

impl From<bool> for ClaimFlag {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The `aud` claim - a single client id or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience
    Single(String),
    /// Several audiences
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `client_id` is one of the audiences
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::Single(aud) => aud == client_id,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Indicates whether the user appears to be a real person
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum RealUserStatus {
    /// Not supported on this platform
    Unsupported = 0,
    /// Apple could not determine the status
    Unknown = 1,
    /// The user is likely a real person
    LikelyReal = 2,
}

/// Claims of a verified identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTokenClaims {
    /// Issuer, `https://appleid.apple.com`
    pub iss: String,
    /// Stable unique identifier of the user
    pub sub: String,
    /// Your client id
    pub aud: Audience,
    /// Expiry, seconds since the Unix epoch
    pub exp: u64,
    /// Issue time, seconds since the Unix epoch
    pub iat: u64,
    /// Nonce from the authorization request, if one was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Whether the platform supports nonces; if `true` a missing nonce must be treated as a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce_supported: Option<bool>,
    /// The user's email (real or private relay address)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether Apple verified the email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<ClaimFlag>,
    /// Whether the email is a private relay address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private_email: Option<ClaimFlag>,
    /// Real-user indicator (native platforms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_user_status: Option<RealUserStatus>,
    /// Authentication time, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<u64>,
    /// Hash of the authorization code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    /// Hash of the access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    /// Transfer identifier, present while an app is moving between teams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_sub: Option<String>,
}

impl IdentityTokenClaims {
    /// Whether Apple verified the email, normalized
    pub fn is_email_verified(&self) -> bool {
        self.email_verified.as_ref().is_some_and(ClaimFlag::is_true)
    }

    /// Whether the email is a private relay address, normalized
    pub fn is_private_relay_email(&self) -> bool {
        self.is_private_email
            .as_ref()
            .is_some_and(ClaimFlag::is_true)
    }
}

/// Kind of a server-to-server notification event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookEventType {
    /// The user stopped forwarding email to their private relay address
    EmailDisabled,
    /// The user resumed forwarding email to their private relay address
    EmailEnabled,
    /// The user stopped using Sign in with Apple with the app
    ConsentRevoked,
    /// The user deleted their Apple account
    AccountDelete,
    /// An event type this version does not know about
    #[serde(other)]
    Unknown,
}

/// Event described by a webhook token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Kind of event
    #[serde(rename = "type")]
    pub event_type: WebhookEventType,
    /// The user the event is about
    pub sub: String,
    /// When the event happened
    pub event_time: i64,
    /// The user's email; only on `email-disabled` / `email-enabled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the email is a private relay address; only on email events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private_email: Option<ClaimFlag>,
}

/// Claims of a verified webhook token, with `events` decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTokenClaims {
    /// Issuer, `https://appleid.apple.com`
    pub iss: String,
    /// Your client id
    pub aud: Audience,
    /// Expiry, seconds since the Unix epoch
    pub exp: u64,
    /// Issue time, seconds since the Unix epoch
    pub iat: u64,
    /// Unique token id
    pub jti: String,
    /// The decoded event
    pub events: WebhookEvent,
}

/// Webhook claims as signed, with `events` not yet interpreted
///
/// Apple sends `events` as a JSON document embedded in a string. Any other
/// shape is held as-is so it surfaces from [`decode_events`](Self::decode_events)
/// rather than failing signature verification.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawWebhookTokenClaims {
    pub iss: String,
    pub aud: Audience,
    pub exp: u64,
    pub iat: u64,
    pub jti: String,
    pub events: serde_json::Value,
}

impl RawWebhookTokenClaims {
    /// Decode the embedded `events` document
    ///
    /// Only called on claims whose signature has already been verified.
    pub(crate) fn decode_events(self) -> Result<WebhookTokenClaims> {
        let document: String = serde_json::from_value(self.events)
            .map_err(AppleAuthError::MalformedEvents)?;
        let events = serde_json::from_str(&document)
            .map_err(AppleAuthError::MalformedEvents)?;

        Ok(WebhookTokenClaims {
            iss: self.iss,
            aud: self.aud,
            exp: self.exp,
            iat: self.iat,
            jti: self.jti,
            events,
        })
    }
}
