//! Bounded in-process cache backend.

use std::{num::NonZeroUsize, sync::Arc, sync::Mutex, time::Duration};

use lru::LruCache;

use crate::util::clock::Clock;

use super::keys::CacheKey;
use super::lock::mutex_lock;
use super::store::{CacheEntry, CacheError, CacheStore};

const SOURCE: &str = "cache::memory";

/// LRU store that evicts the least recently read entry once `capacity` is reached.
pub struct MemoryStore {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &CacheKey, max_age: Duration) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now, max_age) => Ok(Some(entry.clone())),
            _ => Ok(None),
        }
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let key = CacheKey::from_raw(entry.key.clone());
        mutex_lock(&self.entries, SOURCE, "set").put(key, entry);
        Ok(())
    }

    fn prune(&self, max_age: Duration) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "prune");
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now, max_age))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;
    use serde_json::json;

    fn store(capacity: usize) -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(0));
        let capacity = NonZeroUsize::new(capacity).expect("non-zero");
        (clock.clone(), MemoryStore::new(capacity, clock))
    }

    fn key(n: u8) -> CacheKey {
        CacheKey::from_raw(format!("states_{n:016x}"))
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let (_clock, store) = store(2);
        let ttl = Duration::from_secs(60);
        store.set(CacheEntry::new(&key(1), 0, json!(1))).expect("set");
        store.set(CacheEntry::new(&key(2), 0, json!(2))).expect("set");

        // Touch the first entry so the second becomes the eviction candidate.
        assert!(store.get(&key(1), ttl).expect("get").is_some());
        store.set(CacheEntry::new(&key(3), 0, json!(3))).expect("set");

        assert_eq!(store.len(), 2);
        assert!(store.get(&key(1), ttl).expect("get").is_some());
        assert!(store.get(&key(2), ttl).expect("get").is_none());
        assert!(store.get(&key(3), ttl).expect("get").is_some());
    }

    #[test]
    fn stale_entries_read_as_absent_and_prune() {
        let (clock, store) = store(8);
        store.set(CacheEntry::new(&key(1), 0, json!("a"))).expect("set");
        store.set(CacheEntry::new(&key(2), 25, json!("b"))).expect("set");

        clock.set(31);
        let ttl = Duration::from_secs(30);
        assert!(store.get(&key(1), ttl).expect("get").is_none());
        assert!(store.get(&key(2), ttl).expect("get").is_some());

        assert_eq!(store.prune(ttl).expect("prune"), 1);
        assert_eq!(store.len(), 1);
    }
}
