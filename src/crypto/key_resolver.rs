// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-caller cipher secret resolution with an in-process LRU cache.
//!
//! Resolution never fails: a missing descriptor or a store error degrades
//! to the configured default secret, cached for a shorter TTL so the real
//! secret is picked up soon after it is provisioned.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{debug, warn};

use crate::config::KeyCacheConfig;
use crate::storage::DescriptorStore;

/// Longest time an entry may stay cached, whatever the configured TTL.
const MAX_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cached secret + expiry.
struct CacheEntry {
    secret: String,
    expires_at: Instant,
}

/// Resolves the envelope secret of a caller.
pub struct CipherKeyResolver {
    store: Arc<dyn DescriptorStore>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    default_ttl: Duration,
    default_secret: String,
}

impl CipherKeyResolver {
    pub fn new(store: Arc<dyn DescriptorStore>, config: &KeyCacheConfig) -> Self {
        Self {
            store,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl: config.ttl,
            default_ttl: config.default_ttl,
            default_secret: config.default_secret.clone(),
        }
    }

    /// Secret for `caller_id`, from cache or from any active descriptor of
    /// the caller; the default secret otherwise.
    pub fn get_key(&self, caller_id: &str) -> String {
        if let Some(secret) = self.cached(caller_id) {
            return secret;
        }

        let (secret, ttl) = match self.store.active_descriptor_for_caller(caller_id) {
            Ok(Some(descriptor)) => (descriptor.secret_key, self.ttl),
            Ok(None) => {
                debug!(caller_id = %caller_id, "No active descriptor, using default cipher key");
                (self.default_secret.clone(), self.default_ttl)
            }
            Err(e) => {
                warn!(caller_id = %caller_id, error = %e, "Cipher key lookup failed, using default cipher key");
                (self.default_secret.clone(), self.default_ttl)
            }
        };

        self.remember(caller_id, &secret, ttl);
        secret
    }

    /// Drop the cached secret of a caller.
    pub fn invalidate(&self, caller_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(caller_id);
        }
    }

    fn cached(&self, caller_id: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(caller_id) {
            if Instant::now() < entry.expires_at {
                return Some(entry.secret.clone());
            }
            // Expired, drop it
            cache.pop(caller_id);
        }
        None
    }

    fn remember(&self, caller_id: &str, secret: &str, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_CACHE_TTL)).unwrap_or(now);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                caller_id.to_string(),
                CacheEntry {
                    secret: secret.to_string(),
                    expires_at,
                },
            );
        }
    }
}
