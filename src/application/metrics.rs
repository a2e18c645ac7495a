//! Observability metrics for the throttle gate.
//!
//! Provides counters describing how calls flowed through the gate for
//! monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Metrics tracking throttle gate statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Actual (non-cached) calls recorded in a ledger
    calls_throttled: AtomicU64,
    /// Calls that bypassed throttling on a cache hit
    cache_hits: AtomicU64,
    /// Actual calls that had to wait before proceeding
    calls_delayed: AtomicU64,
    /// Cache probes that failed and were treated as misses
    probe_failures: AtomicU64,
    /// Waiting calls abandoned through cancellation
    waits_cancelled: AtomicU64,
    /// Total enforced wait across all calls, in nanoseconds
    wait_nanos: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                calls_throttled: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
                calls_delayed: AtomicU64::new(0),
                probe_failures: AtomicU64::new(0),
                waits_cancelled: AtomicU64::new(0),
                wait_nanos: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_throttled_call(&self) {
        self.inner.calls_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delay(&self, waited: Duration) {
        self.inner.calls_delayed.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.inner.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_probe_failure(&self) {
        self.inner.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled_wait(&self) {
        self.inner.waits_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of actual calls recorded.
    pub fn calls_throttled(&self) -> u64 {
        self.inner.calls_throttled.load(Ordering::Relaxed)
    }

    /// Get the number of cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.inner.cache_hits.load(Ordering::Relaxed)
    }

    /// Get the number of actual calls that were delayed.
    pub fn calls_delayed(&self) -> u64 {
        self.inner.calls_delayed.load(Ordering::Relaxed)
    }

    /// Get the number of failed cache probes.
    pub fn probe_failures(&self) -> u64 {
        self.inner.probe_failures.load(Ordering::Relaxed)
    }

    /// Get the number of cancelled waits.
    pub fn waits_cancelled(&self) -> u64 {
        self.inner.waits_cancelled.load(Ordering::Relaxed)
    }

    /// Get the total enforced wait.
    pub fn total_wait(&self) -> Duration {
        Duration::from_nanos(self.inner.wait_nanos.load(Ordering::Relaxed))
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_throttled: self.calls_throttled(),
            cache_hits: self.cache_hits(),
            calls_delayed: self.calls_delayed(),
            probe_failures: self.probe_failures(),
            waits_cancelled: self.waits_cancelled(),
            total_wait: self.total_wait(),
        }
    }

    /// Reset all metrics to zero.
    ///
    /// Useful for testing or when starting a new monitoring period.
    pub fn reset(&self) {
        self.inner.calls_throttled.store(0, Ordering::Relaxed);
        self.inner.cache_hits.store(0, Ordering::Relaxed);
        self.inner.calls_delayed.store(0, Ordering::Relaxed);
        self.inner.probe_failures.store(0, Ordering::Relaxed);
        self.inner.waits_cancelled.store(0, Ordering::Relaxed);
        self.inner.wait_nanos.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Actual (non-cached) calls recorded in a ledger
    pub calls_throttled: u64,
    /// Calls that bypassed throttling on a cache hit
    pub cache_hits: u64,
    /// Actual calls that had to wait
    pub calls_delayed: u64,
    /// Cache probes that failed
    pub probe_failures: u64,
    /// Waits abandoned through cancellation
    pub waits_cancelled: u64,
    /// Total enforced wait
    pub total_wait: Duration,
}

impl MetricsSnapshot {
    /// Get the total number of calls that reached their operation.
    pub fn total_calls(&self) -> u64 {
        self.calls_throttled.saturating_add(self.cache_hits)
    }

    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no calls have been processed.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Average enforced wait per delayed call.
    pub fn average_delay(&self) -> Duration {
        if self.calls_delayed == 0 {
            Duration::ZERO
        } else {
            self.total_wait / u32::try_from(self.calls_delayed).unwrap_or(u32::MAX)
        }
    }
}
