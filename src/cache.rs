//! In-process coordination cache.
//!
//! Implements the cache boundary the engine depends on: get/set with TTL,
//! increment-with-expiry (rate limiting), and a bounded list window (recent
//! tick payloads for reconnection). A single-process implementation; the
//! engine only sees this surface, so a shared store can replace it without
//! touching callers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Debug)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// TTL key-value store plus counters and bounded lists.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, Entry>>,
    counters: Mutex<HashMap<String, Counter>>,
    windows: Mutex<HashMap<String, Vec<String>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, optionally expiring after `ttl`.
    pub fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    /// Get a key if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&self, key: &str) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }

    /// Increment a counter, starting a fresh window of `ttl` if the previous
    /// one expired. Returns the post-increment count within the window.
    pub fn incr_with_expiry(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        let mut counters = self.counters.lock().expect("cache lock poisoned");
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + ttl,
        });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + ttl;
        }
        counter.count += 1;
        counter.count
    }

    /// Push onto a bounded list, trimming to the most recent `max_len` items.
    pub fn push_trim(&self, key: &str, value: String, max_len: usize) {
        let mut windows = self.windows.lock().expect("cache lock poisoned");
        let list = windows.entry(key.to_string()).or_default();
        list.push(value);
        if list.len() > max_len {
            let excess = list.len() - max_len;
            list.drain(..excess);
        }
    }

    /// All items currently in a list window, oldest first.
    pub fn get_window(&self, key: &str) -> Vec<String> {
        self.windows
            .lock()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn delete_window(&self, key: &str) {
        self.windows
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }
}
