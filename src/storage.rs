// Keyed state storage
//
// Active crises are kept behind this trait so a durable backend can replace
// the in-memory map without touching escalation logic.

use dashmap::DashMap;

/// Minimal keyed store with last-write-wins semantics
pub trait KeyValueStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace; returns the previous value
    fn put(&self, key: &str, value: V) -> Option<V>;

    fn remove(&self, key: &str) -> Option<V>;

    /// Apply `f` to the stored value in place; false if the key is absent
    fn update(&self, key: &str, f: &mut dyn FnMut(&mut V)) -> bool;

    fn values(&self) -> Vec<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

/// DashMap-backed store
pub struct InMemoryStore<V> {
    map: DashMap<String, V>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> KeyValueStore<V> for InMemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, value: V) -> Option<V> {
        self.map.insert(key.to_string(), value)
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(&mut V)) -> bool {
        match self.map.get_mut(key) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    fn values(&self) -> Vec<V> {
        self.map.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        assert!(store.put("user-1", 1).is_none());
        assert_eq!(store.put("user-1", 2), Some(1));
        assert_eq!(store.get("user-1"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_and_remove() {
        let store: InMemoryStore<Vec<u8>> = InMemoryStore::new();
        store.put("k", vec![1]);
        assert!(store.update("k", &mut |v| v.push(2)));
        assert!(!store.update("missing", &mut |v| v.push(3)));
        assert_eq!(store.remove("k"), Some(vec![1, 2]));
        assert!(store.is_empty());
    }
}
