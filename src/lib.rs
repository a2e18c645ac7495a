//! # throttle-gate
//!
//! Cache-aware, per-identity rate limiting for outbound calls to external
//! providers.
//!
//! A [`ThrottleGate`] wraps an async operation (an HTTP request, a database
//! query, a paid API call). Before running it, the gate asks a cheap cache
//! probe whether the result is already cached:
//!
//! - **Cache hit**: the operation runs immediately and is not counted.
//! - **Cache miss**: the call waits until its identity is below the
//!   rolling-window cap *and* the minimum spacing since its previous actual
//!   call has elapsed, is recorded, and then runs.
//!
//! Limits are tracked independently per identity, so a burst against one
//! provider never delays calls to another.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use throttle_gate::ThrottleGate;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! // At most 30 actual calls per minute, spaced at least 200ms apart
//! let gate = ThrottleGate::builder()
//!     .with_max_calls_per_window(30)
//!     .with_window(Duration::from_secs(60))
//!     .with_calls_per_second(5.0)
//!     .build()
//!     .unwrap();
//!
//! # let cache_has = |_: &str| false;
//! # async fn fetch_quote(symbol: &str) -> Result<f64, std::io::Error> { Ok(1.0) }
//! let quote = gate
//!     .execute(
//!         "quotes-api",
//!         || cache_has("quote:AAPL"),
//!         || fetch_quote("AAPL"),
//!     )
//!     .await;
//! # }
//! ```
//!
//! ## Cache Probes
//!
//! A probe is any `FnOnce()` returning `bool` or `Result<bool, E>`. Probes that
//! return an error or panic are logged at `DEBUG` and treated as a miss, so a
//! broken cache can only make the gate stricter, never looser.
//!
//! [`CacheProbeAdapter`] builds probes from a [`CacheStore`] and a key
//! function so the probe and the operation derive the same cache key:
//!
//! ```rust,no_run
//! # use throttle_gate::{CacheProbeAdapter, CacheStore, ThrottleGate};
//! # use std::sync::Arc;
//! # async fn demo<C: CacheStore<Key = String>>(gate: ThrottleGate, store: Arc<C>) {
//! let quotes = CacheProbeAdapter::new(store, |symbol: &str| format!("quote:{}", symbol));
//!
//! let value = gate
//!     .execute("quotes-api", quotes.probe("AAPL"), || async { 187.3 })
//!     .await;
//! # }
//! ```
//!
//! ## Waiting Strategy
//!
//! By default the window wait and the interval wait are served one after the
//! other ([`WaitStrategy::Sequential`]). [`WaitStrategy::Combined`] waits only
//! for the longer of the two.
//!
//! ## Cancellation
//!
//! [`ThrottleGate::execute_with_cancellation`] accepts a [`CancellationToken`].
//! A call cancelled while waiting returns [`WaitCancelled`], is never recorded
//! and never runs its operation.
//!
//! ## Observability
//!
//! ```rust,no_run
//! # use throttle_gate::ThrottleGate;
//! # async fn demo(gate: ThrottleGate) {
//! let metrics = gate.metrics().snapshot();
//! println!("cache hit rate: {:.1}%", metrics.cache_hit_rate() * 100.0);
//! println!("average delay: {:?}", metrics.average_delay());
//!
//! if let Some(state) = gate.snapshot("quotes-api").await {
//!     println!("{} calls in window, next call waits {:?}", state.calls_in_window, state.next_call_delay);
//! }
//! # }
//! ```
//!
//! Waits, probe failures and cancellations are logged through `tracing` at
//! `DEBUG`; cache hits at `TRACE`.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    config::{ConfigError, LimiterConfig, WaitStrategy},
    identity::Identity,
    ledger::{CallLedger, WaitReason},
};

#[cfg(feature = "serde")]
pub use domain::config::LimiterSettings;

pub use application::{
    gate::{ThrottleGate, WaitCancelled},
    metrics::{Metrics, MetricsSnapshot},
    ports::{CacheStore, Clock, Storage},
    probe::{CacheProbeAdapter, ProbeFailure, ProbeOutcome},
    registry::IdentitySnapshot,
};

pub use infrastructure::{
    builder::{BuildError, ThrottleGateBuilder},
    clock::SystemClock,
    storage::{DefaultStorage, ShardedStorage},
};

pub use tokio_util::sync::CancellationToken;
