//! Cache probes.
//!
//! A cache probe answers, without performing the expensive operation, whether
//! a call would be served from cache. The gate only needs a yes/no answer; a
//! probe that cannot answer is treated as "not cached" so that a broken cache
//! never lets calls slip past the rate limits.

use crate::application::ports::CacheStore;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Description of why a cache probe could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    message: String,
}

impl ProbeFailure {
    /// Create a failure from any displayable cause.
    pub fn new(cause: impl fmt::Display) -> Self {
        Self {
            message: cause.to_string(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache probe failed: {}", self.message)
    }
}

impl std::error::Error for ProbeFailure {}

/// Result types a cache probe may return.
///
/// Implemented for plain `bool` probes and for fallible `Result<bool, E>`
/// probes so callers can hand the gate whichever their cache offers.
pub trait ProbeOutcome {
    /// Convert into "is cached", or the reason the probe failed.
    fn into_outcome(self) -> Result<bool, ProbeFailure>;
}

impl ProbeOutcome for bool {
    fn into_outcome(self) -> Result<bool, ProbeFailure> {
        Ok(self)
    }
}

impl<E> ProbeOutcome for Result<bool, E>
where
    E: fmt::Display,
{
    fn into_outcome(self) -> Result<bool, ProbeFailure> {
        self.map_err(ProbeFailure::new)
    }
}

/// Binds a cache store and a key-derivation function into cache probes.
///
/// The key function must derive the key from the same arguments the wrapped
/// operation uses, so the probe and the operation agree on what is cached.
///
/// # Example
/// ```
/// use throttle_gate::{CacheProbeAdapter, CacheStore};
/// use std::collections::HashSet;
/// use std::convert::Infallible;
/// use std::sync::Arc;
///
/// struct Keys(HashSet<String>);
///
/// impl CacheStore for Keys {
///     type Key = String;
///     type Error = Infallible;
///
///     fn contains(&self, key: &String) -> Result<bool, Infallible> {
///         Ok(self.0.contains(key))
///     }
/// }
///
/// let store = Arc::new(Keys(HashSet::from(["quote:AAPL".to_string()])));
/// let adapter = CacheProbeAdapter::new(store, |symbol: &str| format!("quote:{}", symbol));
///
/// assert!(adapter.is_cached("AAPL"));
/// assert!(!adapter.is_cached("MSFT"));
/// ```
pub struct CacheProbeAdapter<C, F> {
    store: Arc<C>,
    key_fn: F,
}

impl<C, F> CacheProbeAdapter<C, F>
where
    C: CacheStore,
{
    /// Create an adapter over a store and a key-derivation function.
    pub fn new(store: Arc<C>, key_fn: F) -> Self {
        Self { store, key_fn }
    }

    /// Derive the cache key for a set of operation arguments.
    pub fn key_for<A>(&self, args: &A) -> C::Key
    where
        A: ?Sized,
        F: Fn(&A) -> C::Key,
    {
        (self.key_fn)(args)
    }

    /// Build a probe for [`ThrottleGate::execute`](crate::ThrottleGate::execute).
    ///
    /// Lookup errors are reported to the gate, which logs them and treats
    /// the call as not cached.
    pub fn probe<'a, A>(&'a self, args: &'a A) -> impl FnOnce() -> Result<bool, C::Error> + 'a
    where
        A: ?Sized,
        F: Fn(&A) -> C::Key,
    {
        move || self.store.contains(&self.key_for(args))
    }

    /// Check presence directly, treating any lookup error as a miss.
    pub fn is_cached<A>(&self, args: &A) -> bool
    where
        A: ?Sized,
        F: Fn(&A) -> C::Key,
    {
        match self.store.contains(&self.key_for(args)) {
            Ok(cached) => cached,
            Err(e) => {
                debug!(error = %e, "cache lookup failed, treating as miss");
                false
            }
        }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<C> {
        &self.store
    }
}

impl<C, F> Clone for CacheProbeAdapter<C, F>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key_fn: self.key_fn.clone(),
        }
    }
}

impl<C, F> fmt::Debug for CacheProbeAdapter<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheProbeAdapter")
            .field("store", &std::any::type_name::<C>())
            .field("key_fn", &"<fn>")
            .finish()
    }
}
