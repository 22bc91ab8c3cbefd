//! Apple signing keys - fetching, caching, and resolution
//!
//! ```text
//!   token header kid
//!         │
//!         ▼
//!   ┌─────────────┐  miss   ┌───────────────┐  GET /auth/keys
//!   │ KeyResolver │───────▶│ KeySetFetcher │──────────────────▶ Apple
//!   └─────────────┘         └───────────────┘
//!         │ lookup                 │ replace
//!         ▼                        ▼
//!   ┌──────────────────────────────────────┐
//!   │               KeyCache               │
//!   └──────────────────────────────────────┘
//! ```
//!
//! - [`cache`] - kid → public key mapping, replaced as a whole on every fetch
//! - [`fetcher`] - downloads and parses the published key set
//! - [`resolver`] - cache-first lookup with a single refresh on miss

pub mod cache;
pub mod fetcher;
pub mod resolver;

pub use cache::KeyCache;
pub use fetcher::{FetchOptions, KeySetFetcher};
pub use resolver::{CachingKeyResolver, KeyResolver};

use std::fmt;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::DecodingKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{BigUint, RsaPublicKey};

use crate::error::{AppleAuthError, Result};

const DECODE_CONFIG: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, DECODE_CONFIG);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, DECODE_CONFIG);

/// An Apple public signing key
///
/// Holds both the PEM (SubjectPublicKeyInfo) rendering of the key and the
/// ready-to-use [`DecodingKey`] built from it.
#[derive(Clone)]
pub struct ApplePublicKey {
    kid: String,
    pem: String,
    decoding_key: DecodingKey,
}

impl ApplePublicKey {
    /// Build a key from the base64url modulus and exponent published by Apple
    ///
    /// Padded and standard-alphabet base64 are accepted as well.
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::InvalidSigningKey`] if either component does not
    /// decode or the pair is not a valid RSA public key.
    pub fn from_components(kid: impl Into<String>, n: &str, e: &str) -> Result<Self> {
        let kid = kid.into();
        let invalid = |reason: String| AppleAuthError::InvalidSigningKey {
            kid: kid.clone(),
            reason,
        };

        let modulus = decode_component(n)
            .map_err(|source| invalid(format!("modulus: {source}")))?;
        let exponent = decode_component(e)
            .map_err(|source| invalid(format!("exponent: {source}")))?;

        let public_key = RsaPublicKey::new(
            BigUint::from_bytes_be(&modulus),
            BigUint::from_bytes_be(&exponent),
        )
        .map_err(|e| invalid(e.to_string()))?;

        let pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| invalid(e.to_string()))?;

        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|source| invalid(source.to_string()))?;

        Ok(Self {
            kid,
            pem,
            decoding_key,
        })
    }

    /// Key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// PEM-encoded public key
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Key ready for signature verification
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for ApplePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplePublicKey")
            .field("kid", &self.kid)
            .field("pem", &self.pem)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ApplePublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.kid == other.kid && self.pem == other.pem
    }
}

fn decode_component(value: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT
        .decode(value)
        .or_else(|_| STANDARD_LENIENT.decode(value))
}
