//! # Apple Sign-In Auth - Sign in with Apple for Rust
//!
//! Client for Apple's OAuth 2.0 / OpenID Connect service: build authorization
//! URLs, sign client secrets, exchange / refresh / revoke tokens, and verify
//! identity and server-to-server notification tokens against Apple's rotating
//! signing keys.
//!
//! ## Key Features
//!
//! - **Key Rotation** - Signing keys are cached per client and refreshed exactly
//!   once when a token names a key the cache does not know
//! - **Distinct Failures** - Invalid input, unreachable Apple, and rejected tokens
//!   are separate [`ErrorCategory`] values
//! - **Replaceable Transport** - Every request goes through an [`HttpTransport`]
//!   that can be swapped at runtime
//! - **Claims as Sent** - Boolean claims Apple sometimes sends as strings are kept
//!   as received ([`ClaimFlag`]) with normalizing accessors
//!
//! ## Architecture
//!
//! - [`config`] - Endpoint and transport configuration
//! - [`transport`] - `HttpTransport` trait, reqwest implementation, replaceable handle
//! - [`keys`] - Key set fetching, caching and resolution
//! - [`verify`] - Identity and webhook token verification
//! - [`claims`] - Claim types of verified tokens
//! - [`client_secret`] - ES256 client secret signing
//! - [`authorize`] - Authorization URL construction
//! - [`token`] - Token exchange, refresh and revocation
//! - [`client`] - The [`AppleClient`] facade
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apple_signin_auth::{
//!     AppleClient, AppleConfig, AuthorizationTokenOptions, AuthorizationUrlOptions,
//!     ClientSecretOptions, EndpointResponse, VerifyOptions,
//! };
//!
//! # async fn example() -> apple_signin_auth::Result<()> {
//! let client = AppleClient::new(AppleConfig::default())?;
//!
//! // 1. Send the user to Apple
//! let url = client.authorization_url(
//!     &AuthorizationUrlOptions::new("com.example.web", "https://example.com/auth/apple")
//!         .with_scope("name email"),
//! )?;
//! # let _ = url;
//!
//! // 2. Exchange the returned code
//! let secret = client.client_secret(
//!     &ClientSecretOptions::new("com.example.web", "TEAM123456", "KEY123456")
//!         .with_private_key_path("AuthKey_KEY123456.p8"),
//! )?;
//! let response = client
//!     .authorization_token("c0de", &AuthorizationTokenOptions::new("com.example.web", secret))
//!     .await?;
//!
//! // 3. Verify the identity token
//! if let EndpointResponse::Success(tokens) = response
//!     && let Some(id_token) = tokens.id_token
//! {
//!     let claims = client
//!         .verify_id_token(&id_token, &VerifyOptions::default().with_audience(["com.example.web"]))
//!         .await?;
//!     println!("signed in as {}", claims.sub);
//! }
//! # Ok(())
//! # }
//! ```

pub mod authorize;
pub mod claims;
pub mod client;
pub mod client_secret;
pub mod config;
pub mod error;
pub mod keys;
pub mod token;
pub mod transport;
pub mod verify;

#[doc(inline)]
pub use authorize::{AuthorizationUrlOptions, ResponseMode, authorization_url};
#[doc(inline)]
pub use claims::{
    Audience, ClaimFlag, IdentityTokenClaims, RealUserStatus, WebhookEvent, WebhookEventType,
    WebhookTokenClaims,
};
#[doc(inline)]
pub use client::AppleClient;
#[doc(inline)]
pub use client_secret::{ClientSecretClaims, ClientSecretOptions, create_client_secret};
#[doc(inline)]
pub use config::AppleConfig;
#[doc(inline)]
pub use error::{AppleAuthError, ErrorCategory, Result};
#[doc(inline)]
pub use keys::{
    ApplePublicKey, CachingKeyResolver, FetchOptions, KeyCache, KeyResolver, KeySetFetcher,
};
#[doc(inline)]
pub use token::{
    AppleErrorResponse, AuthorizationTokenOptions, AuthorizationTokenResponse, EndpointResponse,
    RefreshTokenOptions, RevokeTokenOptions, TokenTypeHint,
};
#[doc(inline)]
pub use transport::{HttpTransport, ReqwestTransport, TransportHandle};
#[doc(inline)]
pub use verify::{TokenVerifier, VerifyOptions};
