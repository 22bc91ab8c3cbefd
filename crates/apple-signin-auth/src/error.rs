//! Error types for Sign in with Apple operations
//!
//! Every failure is an [`AppleAuthError`]. Callers that only need to know *who*
//! is at fault can branch on [`AppleAuthError::category`]:
//!
//! - [`ErrorCategory::InvalidInput`] - the caller's options were missing or conflicting
//! - [`ErrorCategory::Upstream`] - Apple (or the configured transport) could not be reached
//!   or answered with something unusable
//! - [`ErrorCategory::Rejected`] - the token failed signature or claim checks
//! - [`ErrorCategory::PayloadIntegrity`] - a signature-verified token carried a malformed payload

use std::path::PathBuf;

use http::StatusCode;
use jsonwebtoken::Algorithm;

/// Boxed error returned by custom [`HttpTransport`](crate::transport::HttpTransport) implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppleAuthError>;

/// Coarse classification of an [`AppleAuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Required options missing or conflicting; detected before any network call
    InvalidInput,
    /// Transport failure or unusable response from Apple
    Upstream,
    /// Token signature or claims rejected
    Rejected,
    /// Token verified but its embedded payload is malformed
    PayloadIntegrity,
}

/// A validation, network, or decoding error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AppleAuthError {
    /// A required option is missing, empty, or conflicts with another option
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `private_key_path` points at a file that does not exist
    #[error("can't find private key at {}", .0.display())]
    PrivateKeyNotFound(PathBuf),

    /// Reading the private key file failed
    #[error("failed to read private key: {0}")]
    PrivateKeyRead(#[source] std::io::Error),

    /// The private key could not be used to sign the client secret
    #[error("failed to sign client secret: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Error from the [reqwest] crate
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised by a custom transport
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The keys endpoint answered with a non-success status
    #[error("keys endpoint {endpoint} returned status {status}")]
    KeySetStatus {
        /// Endpoint that was called
        endpoint: String,
        /// Status returned by Apple
        status: StatusCode,
    },

    /// A response body was not the JSON document we expected
    #[error("invalid response from {endpoint}: {source}")]
    InvalidResponse {
        /// Endpoint that was called
        endpoint: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// A published signing key could not be turned into a public key
    #[error("invalid signing key '{kid}': {reason}")]
    InvalidSigningKey {
        /// Key identifier of the offending record
        kid: String,
        /// What went wrong
        reason: String,
    },

    /// The token references a key identifier Apple does not publish
    #[error("key identifier '{0}' is not recognized")]
    UnknownKeyId(String),

    /// The token header carries no key identifier
    #[error("token header is missing the key identifier (kid)")]
    MissingKeyId,

    /// The token is not a well-formed JWT or its claims do not have the expected shape
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The signature does not match the resolved public key
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The `exp` claim is in the past
    #[error("token has expired")]
    Expired,

    /// The `nbf` claim is in the future
    #[error("token is not valid yet")]
    NotYetValid,

    /// The `iss` claim does not match the expected issuer
    #[error("token issuer does not match the expected issuer")]
    IssuerMismatch,

    /// The `aud` claim does not match any expected audience
    #[error("token audience does not match the expected audience")]
    AudienceMismatch,

    /// The header algorithm is not one of the allowed algorithms
    #[error("token algorithm {0:?} is not allowed")]
    AlgorithmMismatch(Algorithm),

    /// A claim required for validation is absent
    #[error("token is missing required claim '{0}'")]
    MissingClaim(String),

    /// The `nonce` claim does not match the nonce sent in the authorization request
    #[error("token nonce does not match the expected nonce")]
    NonceMismatch,

    /// The signature-verified webhook token carries an `events` claim that is not valid JSON
    #[error("malformed webhook events payload: {0}")]
    MalformedEvents(#[source] serde_json::Error),
}

impl AppleAuthError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_)
            | Self::PrivateKeyNotFound(_)
            | Self::PrivateKeyRead(_)
            | Self::Signing(_) => ErrorCategory::InvalidInput,
            Self::Http(_)
            | Self::Transport(_)
            | Self::KeySetStatus { .. }
            | Self::InvalidResponse { .. }
            | Self::InvalidSigningKey { .. } => ErrorCategory::Upstream,
            Self::UnknownKeyId(_)
            | Self::MissingKeyId
            | Self::MalformedToken(_)
            | Self::InvalidSignature
            | Self::Expired
            | Self::NotYetValid
            | Self::IssuerMismatch
            | Self::AudienceMismatch
            | Self::AlgorithmMismatch(_)
            | Self::MissingClaim(_)
            | Self::NonceMismatch => ErrorCategory::Rejected,
            Self::MalformedEvents(_) => ErrorCategory::PayloadIntegrity,
        }
    }

    /// Shorthand for [`AppleAuthError::InvalidInput`]
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Wrap an error raised by a transport implementation
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    /// Map a [`jsonwebtoken`] verification error onto a distinct rejection reason
    pub(crate) fn from_jwt(error: jsonwebtoken::errors::Error, algorithm: Algorithm) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidAlgorithm => Self::AlgorithmMismatch(algorithm),
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::MalformedToken(error.to_string()),
        }
    }
}
