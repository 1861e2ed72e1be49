//! In-memory, TTL-expiring document cache.
//!
//! The front end caches parsed documents keyed by an MD5 digest of their
//! source (a URL, a file's content, or an inline string) so that loading
//! the same source twice in one process doesn't reparse it. Entries expire
//! after a source-kind-specific TTL and are evicted oldest-first once the
//! cache's total tracked byte size exceeds a soft limit.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::key::CacheKey;

/// Distinguishes the two TTL policies assigned to cached documents:
/// URL-fetched documents may change upstream and are kept for a shorter
/// window than documents loaded from a local string or file, which only
/// change if the caller re-supplies different content under the same key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SourceKind {
    /// Fetched over the network.
    Url,
    /// Loaded from an in-memory string or a local file.
    StringOrFile,
}

struct Entry<T> {
    value: Arc<T>,
    inserted_at: Instant,
    ttl: Duration,
    byte_size: u64,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// An in-memory cache of parsed documents, generic over the cached value
/// type so that this crate does not need to depend on the VDOM crate.
pub struct DocumentCache<T> {
    entries: HashMap<CacheKey, Entry<T>>,
    /// Access order, most-recently-touched at the back; used to pick
    /// eviction victims once `total_bytes` exceeds `soft_byte_limit`.
    order: VecDeque<CacheKey>,
    total_bytes: u64,
    soft_byte_limit: u64,
}

impl<T> DocumentCache<T> {
    /// Creates an empty cache with the given soft byte-size limit.
    pub fn new(soft_byte_limit: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            total_bytes: 0,
            soft_byte_limit,
        }
    }

    /// Looks up `key`, returning the cached value if present and not
    /// expired. An expired entry is evicted on lookup rather than left for
    /// a background sweep.
    pub fn get(&mut self, key: CacheKey) -> Option<Arc<T>> {
        let now = Instant::now();
        if self.entries.get(&key).is_some_and(|e| e.is_expired(now)) {
            self.remove(key);
            return None;
        }
        let value = self.entries.get(&key).map(|e| Arc::clone(&e.value))?;
        self.touch(key);
        Some(value)
    }

    /// Inserts a document under `key`, replacing any existing entry.
    /// `ttl` should come from [`SourceKind`] via the caller's configured
    /// `url_cache_ttl_secs`/`string_cache_ttl_secs`. After inserting,
    /// evicts least-recently-touched entries until the cache is back under
    /// its soft byte limit.
    pub fn insert(&mut self, key: CacheKey, value: T, ttl: Duration, byte_size: u64) {
        if self.entries.contains_key(&key) {
            self.remove(key);
        }
        self.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                inserted_at: Instant::now(),
                ttl,
                byte_size,
            },
        );
        self.order.push_back(key);
        self.total_bytes += byte_size;
        self.evict_to_limit();
    }

    /// Removes every expired entry. Call periodically for long-lived
    /// processes that don't otherwise touch every key.
    pub fn evict_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            self.remove(key);
        }
    }

    /// The number of live (not necessarily unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sum of `byte_size` across all currently cached entries.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn touch(&mut self, key: CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }

    fn remove(&mut self, key: CacheKey) {
        if let Some(entry) = self.entries.remove(&key) {
            self.total_bytes -= entry.byte_size;
        }
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
    }

    fn evict_to_limit(&mut self) {
        while self.total_bytes > self.soft_byte_limit {
            let Some(victim) = self.order.pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.total_bytes -= entry.byte_size;
            }
        }
    }
}
