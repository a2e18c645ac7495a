//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Port for concurrent key-value storage.
///
/// Holds per-identity state. Implementations must scope locking to as few
/// keys as possible so unrelated identities do not contend.
/// Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Access an existing entry without creating it.
    fn with_entry<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);
}

/// Port for the cache store consulted by cache probes.
///
/// Only presence matters: a key that is present means the wrapped operation
/// will be served from cache and needs no throttling. Freshness and eviction
/// belong to the store itself.
pub trait CacheStore: Send + Sync {
    /// Key type the store is indexed by.
    type Key;
    /// Error raised when the store cannot be queried.
    type Error: Display;

    /// Check whether `key` is present.
    fn contains(&self, key: &Self::Key) -> Result<bool, Self::Error>;
}

impl<C> CacheStore for std::sync::Arc<C>
where
    C: CacheStore + ?Sized,
{
    type Key = C::Key;
    type Error = C::Error;

    fn contains(&self, key: &Self::Key) -> Result<bool, Self::Error> {
        (**self).contains(key)
    }
}
