use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::data::artifacts::normalize_location;
use crate::data::types::SentimentSignal;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Topic-keyed sentiment lookups, shared across requests.
///
/// Expired entries are swept on every insert and the map never holds more
/// than `capacity` topics; when full, the oldest entry is dropped.
pub struct SentimentCache {
    cache: DashMap<String, CachedSignal>,
    ttl: Duration,
    capacity: usize,
}

struct CachedSignal {
    signal: SentimentSignal,
    timestamp: Instant,
}

impl SentimentCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, topic: &str, signal: SentimentSignal) {
        let key = cache_key(topic);
        let ttl = self.ttl;
        self.cache.retain(|_, entry| entry.timestamp.elapsed() <= ttl);

        while self.cache.len() >= self.capacity && !self.cache.contains_key(&key) {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.timestamp)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(oldest) => {
                    self.cache.remove(&oldest);
                }
                None => break,
            }
        }

        self.cache.insert(
            key,
            CachedSignal {
                signal,
                timestamp: Instant::now(),
            },
        );
    }

    /// Get signal if not expired (evict on read)
    pub fn get(&self, topic: &str) -> Option<SentimentSignal> {
        let key = cache_key(topic);
        let entry = self.cache.get(&key)?;
        if entry.timestamp.elapsed() > self.ttl {
            drop(entry); // Drop the read lock
            self.cache.remove(&key);
            None
        } else {
            Some(entry.signal.clone())
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn cache_key(topic: &str) -> String {
    normalize_location(topic)
}
