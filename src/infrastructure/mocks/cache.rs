//! In-memory cache store with failure injection.

use crate::application::ports::CacheStore;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Error returned by [`MockCacheStore`] while failure injection is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCacheError;

impl fmt::Display for MockCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock cache unavailable")
    }
}

impl std::error::Error for MockCacheError {}

/// Set of cached keys that counts lookups and can be told to fail.
#[derive(Debug, Default)]
pub struct MockCacheStore {
    keys: Mutex<HashSet<String>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl MockCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as cached.
    pub fn insert(&self, key: impl Into<String>) {
        self.keys().insert(key.into());
    }

    /// Drop a cached key.
    pub fn remove(&self, key: &str) {
        self.keys().remove(key);
    }

    /// Make every following lookup fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups performed, failed ones included.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn keys(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.keys
            .lock()
            .expect("MockCacheStore mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl CacheStore for MockCacheStore {
    type Key = String;
    type Error = MockCacheError;

    fn contains(&self, key: &String) -> Result<bool, MockCacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MockCacheError);
        }
        Ok(self.keys().contains(key))
    }
}
