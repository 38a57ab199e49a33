//! Time-bounded cache of operation results.
//!
//! Keys are SHA-256 digests over the operation name and its arguments in
//! canonical form (object keys sorted), so argument order does not matter.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::trace;

/// A cached value and its expiry.
#[derive(Debug, Clone)]
pub struct CachedResult {
    /// The cached value.
    pub value: Value,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that missed or found an expired entry.
    pub misses: u64,
    /// Live entries.
    pub entries: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedResult>,
    hits: u64,
    misses: u64,
}

/// TTL cache keyed by [`ResultCache::key`].
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl ResultCache {
    /// Create a cache holding at most `max_entries` values for `ttl` each.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hex SHA-256 over `operation` and the canonical form of `arguments`.
    #[must_use]
    pub fn key(operation: &str, arguments: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update([0]);
        hasher.update(canonical(arguments).to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .fold(String::with_capacity(64), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }

    /// The time-to-live applied to new entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key`, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let now = Instant::now();
        match state.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                let value = entry.value.clone();
                state.hits += 1;
                trace!(key, "cache hit");
                Some(value)
            }
            Some(_) => {
                state.entries.remove(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store `value` under `key` for the configured TTL.
    pub fn insert(&self, key: String, value: Value) {
        if self.max_entries == 0 || self.ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut state = self.lock();
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            state.entries.retain(|_, entry| entry.expires_at > now);
            if state.entries.len() >= self.max_entries {
                // Evict whatever expires first.
                if let Some(oldest) = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    state.entries.remove(&oldest);
                }
            }
        }
        state.entries.insert(
            key,
            CachedResult {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Counters snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let sorted = keys
                .into_iter()
                .map(|k| (k.clone(), canonical(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
