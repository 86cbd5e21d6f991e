//! Fixed-capacity least-frequently-used cache
//!
//! Eviction picks the entry with the fewest hits; ties go to the entry
//! used longest ago. Entries can be pinned with a predicate, in which case
//! they are never evicted and the cache may temporarily exceed capacity.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    hits: u64,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict(&mut self, pinned: Option<&(dyn Fn(&V) -> bool + Send + Sync)>) -> Option<(K, V)> {
        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| pinned.map_or(true, |is_pinned| !is_pinned(&entry.value)))
            .min_by_key(|(_, entry)| (entry.hits, entry.last_used))
            .map(|(key, _)| key.clone())?;
        self.entries
            .remove(&victim)
            .map(|entry| (victim, entry.value))
    }
}

pub struct LfuCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
    pinned: Option<Box<dyn Fn(&V) -> bool + Send + Sync>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LfuCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
            pinned: None,
        }
    }

    /// Never evict values matching `pinned`
    pub fn with_pinned(mut self, pinned: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.pinned = Some(Box::new(pinned));
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up and count a hit
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    /// Look up without counting a hit
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace; returns the evicted entry, if any
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.hits += 1;
            entry.last_used = tick;
            return None;
        }
        let evicted = if inner.entries.len() >= self.capacity {
            inner.evict(self.pinned.as_deref())
        } else {
            None
        };
        inner.entries.insert(
            key,
            Entry {
                value,
                hits: 1,
                last_used: tick,
            },
        );
        evicted
    }

    /// Return the cached value or atomically insert the one built by `init`
    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> V {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.hits += 1;
            entry.last_used = tick;
            return entry.value.clone();
        }
        if inner.entries.len() >= self.capacity {
            inner.evict(self.pinned.as_deref());
        }
        let value = init();
        inner.entries.insert(
            key,
            Entry {
                value: value.clone(),
                hits: 1,
                last_used: tick,
            },
        );
        value
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_frequently_used() {
        let cache = LfuCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get("a");
        cache.get("a");
        cache.get("b");

        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("a"), Some(1));
        assert_eq!(cache.peek("b"), None);
    }

    #[test]
    fn test_ties_evict_oldest() {
        let cache = LfuCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let cache = LfuCache::new(1);
        cache.insert("a", 1);
        assert_eq!(cache.insert("a", 2), None);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_pinned_entries_survive() {
        let cache = LfuCache::new(1).with_pinned(|v: &i32| *v < 0);
        cache.insert("pinned", -1);
        assert_eq!(cache.insert("other", 5), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("pinned"), Some(-1));

        // the unpinned one goes first
        assert_eq!(cache.insert("third", 7), Some(("other", 5)));
    }

    #[test]
    fn test_get_or_insert_with_runs_init_once() {
        let cache = LfuCache::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache.get_or_insert_with("k".to_string(), || {
                calls += 1;
                42
            });
            assert_eq!(value, 42);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = LfuCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(1, 1);
        assert_eq!(cache.insert(2, 2), Some((1, 1)));
        assert_eq!(cache.remove(&2), Some(2));
        assert!(cache.is_empty());
    }
}
