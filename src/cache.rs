use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::probe::ProbeKind;

/// Cache key: the probe kind that produced the value plus the registered domain.
pub type CacheKey = (ProbeKind, String);

struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// Bounded TTL cache shared by concurrent probes.
///
/// Last writer wins; concurrent misses for the same key may each populate it.
/// When full, expired entries are dropped first, then the oldest insertion.
pub struct TtlCache<V> {
    entries: RwLock<ahash::AHashMap<CacheKey, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(ahash::AHashMap::new()),
            ttl,
            capacity: capacity.max(1),
            clock,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, kind: ProbeKind, domain: &str) -> Option<V> {
        let key = (kind, domain.to_string());
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(&key) {
                Some(e) if now.duration_since(e.inserted) < self.ttl => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(e.value.clone());
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(_) => {}
            }
        }
        self.remove_expired(&key, now);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    // Re-checked under the write lock: a put may have refreshed the key since the read.
    fn remove_expired(&self, key: &CacheKey, now: Instant) {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| now.duration_since(e.inserted) >= self.ttl) {
            entries.remove(key);
        }
    }

    pub fn put(&self, kind: ProbeKind, domain: &str, value: V) {
        let now = self.clock.now();
        let key = (kind, domain.to_string());
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, e| now.duration_since(e.inserted) < ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted)
                    .map(|(k, _)| k.clone());
                if let Some(k) = oldest {
                    entries.remove(&k);
                }
            }
        }
        entries.insert(key, Entry { value, inserted: now });
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}
