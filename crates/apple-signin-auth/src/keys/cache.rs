//! In-memory cache of Apple signing keys
//!
//! The cache holds one *generation* of keys at a time: the key set from the
//! most recent successful fetch. A fetch never patches the mapping in place;
//! it builds a complete new map and swaps it in, so readers observe either the
//! previous generation or the new one, never a mix.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::debug;

use super::ApplePublicKey;

/// Mapping from key identifier to Apple public key
pub struct KeyCache {
    keys: ArcSwap<HashMap<String, ApplePublicKey>>,
    generation: AtomicU64,
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            keys: ArcSwap::from_pointee(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Look up a key by identifier
    pub fn get(&self, kid: &str) -> Option<ApplePublicKey> {
        self.keys.load().get(kid).cloned()
    }

    /// Whether a key identifier is cached
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.load().contains_key(kid)
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    /// Whether the cache holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.load().is_empty()
    }

    /// Cached key identifiers, sorted
    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The current generation as a whole
    pub fn snapshot(&self) -> Arc<HashMap<String, ApplePublicKey>> {
        self.keys.load_full()
    }

    /// Number of times the mapping has been replaced
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap in a complete new mapping
    pub(crate) fn replace(&self, keys: HashMap<String, ApplePublicKey>) {
        let key_count = keys.len();
        self.keys.store(Arc::new(keys));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(key_count, generation, "Apple key cache replaced");
    }

    /// Drop every cached key
    pub(crate) fn clear(&self) {
        self.replace(HashMap::new());
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("key_ids", &self.key_ids())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::{PRIMARY, SECONDARY};
    use super::*;

    fn key(kid: &str, material: &super::super::test_keys::TestRsaKey) -> ApplePublicKey {
        ApplePublicKey::from_components(kid, &material.n, &material.e)
            .unwrap()
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = KeyCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 0);
        assert!(cache.get("K1").is_none());
    }

    #[test]
    fn test_replace_swaps_whole_mapping() {
        let cache = KeyCache::new();
        cache.replace(HashMap::from([("K1".to_string(), key("K1", &PRIMARY))]));
        assert!(cache.contains("K1"));
        assert_eq!(cache.generation(), 1);

        cache.replace(HashMap::from([("K2".to_string(), key("K2", &SECONDARY))]));
        assert!(!cache.contains("K1"), "old generation must not leak");
        assert_eq!(cache.key_ids(), vec!["K2".to_string()]);
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn test_snapshot_is_stable_across_replace() {
        let cache = KeyCache::new();
        cache.replace(HashMap::from([("K1".to_string(), key("K1", &PRIMARY))]));

        let snapshot = cache.snapshot();
        cache.clear();

        assert!(snapshot.contains_key("K1"));
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 2);
    }
}
