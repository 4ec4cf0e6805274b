//! In-process TTL cache with pattern invalidation
//!
//! Backs the embedding memo and other read-heavy lookups. Operations never
//! fail; a miss is a normal return value. The map is mutex-guarded so
//! concurrent get/set/invalidate are linearizable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Cache occupancy counters, for observability only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently in the map, expired included
    pub total: usize,
    /// Entries still within their TTL
    pub active: usize,
    /// Entries past expiry that lazy eviction has not yet removed
    pub expired: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Generic keyed cache with explicit per-entry expiry
///
/// Expired entries are deleted lazily on `get` and in bulk by [`cleanup`],
/// which is cheap enough to run on a periodic sweep but not required for
/// correctness. An optional capacity bound evicts the entry with the oldest
/// write timestamp before a new key is inserted at capacity.
///
/// [`cleanup`]: TtlCache::cleanup
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    default_ttl: Duration,
    max_entries: Option<usize>,
}

impl<T: Clone> TtlCache<T> {
    /// Creates an unbounded cache with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_entries: None,
        }
    }

    /// Creates a capacity-bounded cache
    pub fn with_capacity(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_entries: Some(max_entries.max(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value if present and unexpired; expired entries are
    /// deleted on the spot and reported as absent
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Stores with the default TTL, overwriting any previous value
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores with an explicit TTL, overwriting any previous value
    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let mut entries = self.lock();
        let now = Instant::now();

        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(&key) {
                Self::evict_oldest(&mut entries);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                expires_at: now + ttl,
            },
        );
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry<T>>) {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest);
        }
    }

    /// Removes all keys matching the pattern; `*` matches any run of
    /// characters. Returns the number of entries removed.
    ///
    /// Patterns without a wildcard take an O(1) exact-removal path.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut entries = self.lock();

        if !pattern.contains('*') {
            return usize::from(entries.remove(pattern).is_some());
        }

        let regex = match Self::wildcard_regex(pattern) {
            Some(regex) => regex,
            None => return 0,
        };

        let matching: Vec<String> = entries
            .keys()
            .filter(|key| regex.is_match(key))
            .cloned()
            .collect();

        for key in &matching {
            entries.remove(key);
        }

        matching.len()
    }

    /// Translates a `*` wildcard pattern into an anchored regex, escaping
    /// the literal segments so keys containing `?` or `.` match verbatim
    fn wildcard_regex(pattern: &str) -> Option<regex::Regex> {
        let escaped = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        regex::Regex::new(&format!("^{}$", escaped)).ok()
    }

    /// Removes every expired entry; returns the count removed
    pub fn cleanup(&self) -> usize {
        let mut entries = self.lock();
        let now = Instant::now();
        let before = entries.len();

        entries.retain(|_, entry| !entry.is_expired(now));

        before - entries.len()
    }

    /// Drops everything
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Occupancy counters
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let now = Instant::now();

        let total = entries.len();
        let expired = entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .count();

        CacheStats {
            total,
            active: total - expired,
            expired,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
