//! Storage implementations for per-identity state.
//!
//! Provides concurrent, sharded storage so identities hashing to different
//! shards never contend for the same lock.

use crate::application::ports::Storage;
use crate::application::registry::LedgerSlot;
use crate::domain::identity::Identity;
use ahash::RandomState;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Storage used by gates built with [`ThrottleGate::builder`](crate::ThrottleGate::builder).
pub type DefaultStorage = Arc<ShardedStorage<Identity, LedgerSlot>>;

/// Thread-safe sharded storage backed by DashMap.
///
/// DashMap provides lock-free reads and fine-grained locking for writes.
/// Shard guards are only held for the duration of a single accessor call and
/// never across an await point.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, V, RandomState>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Check if a key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Send + Sync + std::fmt::Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        let entry = self.map.entry(key);
        let mut value_ref = entry.or_insert_with(factory);
        accessor(&mut value_ref)
    }

    fn with_entry<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.map.get(key).map(|value| accessor(value.value()))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.map.iter() {
            f(entry.key(), entry.value());
        }
    }
}

// Implement Storage for Arc<ShardedStorage> so clones share one map
impl<K, V> Storage<K, V> for Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Send + Sync + std::fmt::Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn with_entry<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        (**self).with_entry(key, accessor)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        (**self).for_each(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_created_once() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();

        storage.with_entry_mut("key", || 1, |v| *v += 10);
        storage.with_entry_mut("key", || 100, |v| *v += 10);

        assert_eq!(storage.with_entry(&"key", |v| *v), Some(21));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_with_entry_does_not_create() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();

        assert_eq!(storage.with_entry(&"missing", |v| *v), None);
        assert!(storage.is_empty());
        assert!(!storage.contains_key("missing"));
    }

    #[test]
    fn test_for_each() {
        let storage: ShardedStorage<String, usize> = ShardedStorage::new();
        for i in 0..5 {
            storage.with_entry_mut(format!("key_{}", i), || i, |_| ());
        }

        let mut sum = 0;
        storage.for_each(|_, v| sum += v);
        assert_eq!(sum, 10);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let storage: Arc<ShardedStorage<String, usize>> = Arc::new(ShardedStorage::new());
        let mut handles = vec![];

        for i in 0..10 {
            let storage_clone = Arc::clone(&storage);
            let handle = thread::spawn(move || {
                for j in 0..100 {
                    storage_clone.with_entry_mut(format!("key_{}_{}", i, j), || 0, |v| *v += 1);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.len(), 1000);
    }
}
