//! Key resolution for token verification
//!
//! The verifier does not know in advance which key a token was signed with;
//! it asks a [`KeyResolver`] for the key named by the token header's `kid`.
//!
//! [`CachingKeyResolver`] answers from the [`KeyCache`] when it can and
//! refreshes the cache exactly once on a miss:
//!
//! 1. cache hit → return immediately, no network access
//! 2. miss → fetch the key set, remembering (not raising) any fetch error
//! 3. re-check the cache → return the key if the fetch brought it in
//! 4. still missing → the remembered fetch error, or [`AppleAuthError::UnknownKeyId`]

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::{ApplePublicKey, FetchOptions, KeyCache, KeySetFetcher};
use crate::error::{AppleAuthError, Result};

/// Resolves a key identifier to a public key
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Return the public key named `kid`
    ///
    /// # Errors
    ///
    /// Returns an error if no key can be found for `kid`.
    async fn resolve(&self, kid: &str) -> Result<ApplePublicKey>;
}

/// Cache-first resolver that refreshes the key set on a miss
#[derive(Debug, Clone)]
pub struct CachingKeyResolver {
    cache: Arc<KeyCache>,
    fetcher: Arc<KeySetFetcher>,
}

impl CachingKeyResolver {
    /// Create a resolver reading the fetcher's cache
    pub fn new(fetcher: Arc<KeySetFetcher>) -> Self {
        Self {
            cache: Arc::clone(fetcher.cache()),
            fetcher,
        }
    }

    /// The cache consulted by this resolver
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }
}

#[async_trait]
impl KeyResolver for CachingKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<ApplePublicKey> {
        if let Some(key) = self.cache.get(kid) {
            debug!(kid, "Apple signing key served from cache");
            return Ok(key);
        }

        debug!(kid, "Apple signing key not cached, refreshing key set");

        // The cache is consulted again even when the refresh failed: a
        // concurrent refresh may have brought the key in meanwhile.
        let fetch_error = self.fetcher.fetch(FetchOptions::default()).await.err();
        if let Some(e) = &fetch_error {
            warn!(kid, error = %e, "Key set refresh failed, rechecking cache");
        }

        if let Some(key) = self.cache.get(kid) {
            debug!(kid, "Apple signing key found after refresh");
            return Ok(key);
        }

        match fetch_error {
            Some(e) => Err(e),
            None => {
                error!(kid, "Key identifier not present in Apple's key set");
                Err(AppleAuthError::UnknownKeyId(kid.to_string()))
            }
        }
    }
}
