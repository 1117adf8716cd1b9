//! Keyed store with per-key locking
//!
//! The map lock is only held long enough to fetch or create a key's slot.
//! Work under one key never blocks another key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

type Slot<V> = Arc<Mutex<Option<V>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic under the lock leaves the value untouched, so recover it.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
pub struct ConcurrentCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for ConcurrentCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> ConcurrentCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Option<Slot<V>> {
        lock(&self.slots).get(key).cloned()
    }

    fn slot_or_create(&self, key: &K) -> Slot<V> {
        lock(&self.slots)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Store `value` under `key`, creating the key's slot on first use
    pub fn set(&self, key: K, value: V) {
        let slot = self.slot_or_create(&key);
        *lock(&slot) = Some(value);
    }

    /// Current value for `key`. Unknown keys stay unknown.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slot(key)?;
        let value = lock(&slot).clone();
        value
    }

    /// Read-modify-write under the key's lock
    ///
    /// Concurrent updates to one key serialize; `f` sees the value left by
    /// the previous critical section.
    pub fn update<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let slot = self.slot_or_create(&key);
        let mut guard = lock(&slot);
        let next = f(guard.as_ref());
        *guard = Some(next.clone());
        next
    }

    /// Value for `key`, computing and storing it under the key's lock if absent
    pub fn get_or_insert_with<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> V,
    {
        let slot = self.slot_or_create(&key);
        let mut guard = lock(&slot);
        match guard.as_ref() {
            Some(value) => value.clone(),
            None => {
                let value = f();
                *guard = Some(value.clone());
                value
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.slots).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_unknown_key_does_not_create_entry() {
        let cache: ConcurrentCache<String, i32> = ConcurrentCache::new();
        assert_eq!(cache.get(&"missing".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let cache = ConcurrentCache::new();
        cache.set("k", 1);
        cache.set("k", 2);
        assert_eq!(cache.get(&"k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let cache = ConcurrentCache::new();
        let mut calls = 0;
        let a = cache.get_or_insert_with("k", || {
            calls += 1;
            10
        });
        let b = cache.get_or_insert_with("k", || 99);
        assert_eq!((a, b, calls), (10, 10, 1));
    }

    #[test]
    fn test_clear_drops_entries() {
        let cache = ConcurrentCache::new();
        cache.set(1u8, "a");
        cache.clear();
        assert_eq!(cache.get(&1u8), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_poisoned_slot_is_recovered() {
        let cache = Arc::new(ConcurrentCache::new());
        cache.set("k", 1);

        let c = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            c.update("k", |_| panic!("boom"));
        })
        .join();

        assert_eq!(cache.get(&"k"), Some(1));
    }
}
