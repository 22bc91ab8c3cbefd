//! Fetching Apple's published key set
//!
//! Apple publishes its current signing keys at `/auth/keys` as a JSON Web Key
//! Set. Every record is an RSA key carrying a base64url modulus (`n`) and
//! exponent (`e`); the fetcher turns each one into an [`ApplePublicKey`] and
//! swaps the result into the [`KeyCache`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use super::{ApplePublicKey, KeyCache};
use crate::error::{AppleAuthError, Result};
use crate::transport::{self, TransportHandle};

/// Options for a single key set fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Return the keys without caching them; the cache is emptied instead
    pub disable_caching: bool,
}

impl FetchOptions {
    /// Fetch without populating the cache
    pub fn uncached() -> Self {
        Self {
            disable_caching: true,
        }
    }
}

/// A single record of the published key set
#[derive(Debug, Deserialize)]
struct RawSigningKey {
    kid: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
    #[serde(default)]
    kty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeySet {
    keys: Vec<RawSigningKey>,
}

/// Downloads Apple's key set and refreshes a [`KeyCache`]
#[derive(Debug, Clone)]
pub struct KeySetFetcher {
    keys_url: Url,
    transport: TransportHandle,
    cache: Arc<KeyCache>,
}

impl KeySetFetcher {
    /// Create a fetcher for `keys_url` that writes into `cache`
    pub fn new(keys_url: Url, transport: TransportHandle, cache: Arc<KeyCache>) -> Self {
        Self {
            keys_url,
            transport,
            cache,
        }
    }

    /// The keys endpoint
    pub fn keys_url(&self) -> &Url {
        &self.keys_url
    }

    /// The cache this fetcher writes into
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Fetch and parse the current key set
    ///
    /// On success the cache is replaced with the fetched keys, or emptied when
    /// [`FetchOptions::disable_caching`] is set. On failure the cache is left as
    /// it was. No retries are attempted.
    ///
    /// # Errors
    ///
    /// - [`AppleAuthError::Http`] / [`AppleAuthError::Transport`] if the request fails
    /// - [`AppleAuthError::KeySetStatus`] if Apple answers with a non-success status
    /// - [`AppleAuthError::InvalidResponse`] if the body is not a key set
    /// - [`AppleAuthError::InvalidSigningKey`] if a record is not a valid RSA key
    pub async fn fetch(&self, options: FetchOptions) -> Result<Vec<ApplePublicKey>> {
        info!(endpoint = %self.keys_url, "Fetching Apple signing keys");

        let request = transport::json_get(&self.keys_url)?;
        let response = self.transport.execute(request).await.map_err(|e| {
            error!(endpoint = %self.keys_url, error = %e, "Failed to fetch Apple signing keys");
            e
        })?;

        if !response.status().is_success() {
            error!(
                endpoint = %self.keys_url,
                status = %response.status(),
                "Keys endpoint returned error status"
            );
            return Err(AppleAuthError::KeySetStatus {
                endpoint: self.keys_url.to_string(),
                status: response.status(),
            });
        }

        let key_set: RawKeySet = serde_json::from_slice(response.body()).map_err(|e| {
            error!(endpoint = %self.keys_url, error = %e, "Failed to parse key set JSON");
            AppleAuthError::InvalidResponse {
                endpoint: self.keys_url.to_string(),
                source: e,
            }
        })?;

        let keys = parse_key_set(key_set)?;

        if options.disable_caching {
            self.cache.clear();
        } else {
            let mapping: HashMap<String, ApplePublicKey> = keys
                .iter()
                .map(|key| (key.kid().to_string(), key.clone()))
                .collect();
            self.cache.replace(mapping);
        }

        info!(
            endpoint = %self.keys_url,
            key_count = keys.len(),
            cached = !options.disable_caching,
            "Successfully fetched Apple signing keys"
        );

        Ok(keys)
    }
}

fn parse_key_set(key_set: RawKeySet) -> Result<Vec<ApplePublicKey>> {
    let mut keys = Vec::with_capacity(key_set.keys.len());

    for raw in key_set.keys {
        if let Some(kty) = raw.kty.as_deref()
            && kty != "RSA"
        {
            warn!(kid = %raw.kid, kty, "Skipping non-RSA signing key");
            continue;
        }

        keys.push(ApplePublicKey::from_components(raw.kid, &raw.n, &raw.e)?);
    }

    Ok(keys)
}
