//! Process-local result cache.
//!
//! Bounded LRU store where every entry carries its own expiry. Expired
//! entries are never returned, even before they are physically evicted.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Fingerprint for a fetch request
pub fn cache_key(url: &str, wait_selector: Option<&str>) -> String {
    match wait_selector {
        Some(selector) => format!("{}#wait={}", url, selector),
        None => url.to_string(),
    }
}

/// Occupancy report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL is too long to represent; such entries never expire
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// LRU cache with per-entry TTL, safe to share between tasks
pub struct ResultCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum one)
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    /// Look up a live entry, marking it most recently used
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            ::log::trace!("Cache entry expired: {}", key);
            entries.pop(key);
        }
        None
    }

    /// Store a value with the default TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Store a value with an explicit TTL; a zero TTL removes the key instead
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.entries.lock();
        if ttl.is_zero() {
            entries.pop(&key);
            return;
        }

        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                ::log::debug!("Cache evicted least recently used entry: {}", evicted);
            }
        }
    }

    /// Remove a key, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            size: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}
