//! Throttle gate coordination logic.
//!
//! The gate wraps an outbound operation. Calls whose results are already
//! cached pass straight through; every other call first waits until its
//! identity's rolling-window cap and minimum call interval both allow it,
//! is recorded in the identity's ledger, and only then runs.

use crate::application::metrics::Metrics;
use crate::application::ports::Storage;
use crate::application::probe::ProbeOutcome;
use crate::application::registry::{IdentityRegistry, IdentitySnapshot, LedgerSlot};
use crate::domain::{
    config::{LimiterConfig, WaitStrategy},
    identity::Identity,
    ledger::WaitReason,
};
use crate::infrastructure::storage::DefaultStorage;

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Error returned when a caller abandons a call still waiting on a rate limit.
///
/// A cancelled call is never recorded in the ledger and its operation never runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCancelled {
    identity: Identity,
}

impl WaitCancelled {
    /// The identity whose limits the call was waiting on.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl fmt::Display for WaitCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call for identity `{}` was cancelled while waiting on its rate limit",
            self.identity
        )
    }
}

impl std::error::Error for WaitCancelled {}

/// Cache-aware, per-identity rate limiter for outbound calls.
///
/// Construct one per process with [`ThrottleGate::builder`] and pass clones to
/// every client that needs throttling; clones share all limiter state.
///
/// # Example
/// ```
/// use throttle_gate::ThrottleGate;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = ThrottleGate::builder()
///     .with_max_calls_per_window(30)
///     .with_window(Duration::from_secs(60))
///     .with_calls_per_second(5.0)
///     .build()
///     .unwrap();
///
/// let cached = false;
/// let body: Result<String, std::io::Error> = gate
///     .execute("quotes-api", || cached, || async { Ok("AAPL 187.3".to_string()) })
///     .await;
///
/// assert_eq!(body.unwrap(), "AAPL 187.3");
/// # }
/// ```
#[derive(Clone)]
pub struct ThrottleGate<S = DefaultStorage>
where
    S: Storage<Identity, LedgerSlot> + Clone,
{
    registry: IdentityRegistry<S>,
    metrics: Metrics,
}

impl<S> ThrottleGate<S>
where
    S: Storage<Identity, LedgerSlot> + Clone,
{
    /// Create a gate over a registry.
    ///
    /// # Arguments
    /// * `registry` - The identity registry (which contains the clock and configuration)
    /// * `metrics` - Metrics tracker
    pub fn new(registry: IdentityRegistry<S>, metrics: Metrics) -> Self {
        Self { registry, metrics }
    }

    /// Run `operation` once the identity's rate limits allow it.
    ///
    /// `probe` is evaluated first. If it reports the call as cached, the
    /// operation runs immediately and leaves no trace in the identity's ledger.
    /// If it reports a miss, fails, or panics, the call waits for the rolling
    /// window and then for the minimum interval, is recorded, and runs.
    ///
    /// The operation's output is returned unchanged, including any error.
    /// The identity's lock is released before the operation starts, so a slow
    /// operation never holds up other callers.
    pub async fn execute<I, P, O, F, Fut>(&self, identity: I, probe: P, operation: F) -> Fut::Output
    where
        I: Into<Identity>,
        P: FnOnce() -> O,
        O: ProbeOutcome,
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let identity = identity.into();

        if self.is_cached(&identity, probe) {
            return operation().await;
        }

        match self.acquire(&identity, &Uninterrupted).await {
            Ok(()) => operation().await,
            Err(never) => match never {},
        }
    }

    /// Like [`ThrottleGate::execute`], but the wait can be abandoned.
    ///
    /// If `cancel` fires while the call is waiting for its identity's lock or
    /// for a limit to clear, `WaitCancelled` is returned, nothing is recorded
    /// and the operation never runs. Once the call has been recorded the token
    /// no longer affects it. Cache hits never consult the token.
    ///
    /// # Errors
    /// Returns `WaitCancelled` if the token fires before the call is recorded.
    pub async fn execute_with_cancellation<I, P, O, F, Fut>(
        &self,
        identity: I,
        probe: P,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<Fut::Output, WaitCancelled>
    where
        I: Into<Identity>,
        P: FnOnce() -> O,
        O: ProbeOutcome,
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let identity = identity.into();

        if self.is_cached(&identity, probe) {
            return Ok(operation().await);
        }

        self.acquire(&identity, cancel)
            .await
            .map_err(|Interrupted| self.cancelled(&identity))?;
        Ok(operation().await)
    }

    /// Evaluate the probe, treating failures and panics as a miss.
    fn is_cached<P, O>(&self, identity: &Identity, probe: P) -> bool
    where
        P: FnOnce() -> O,
        O: ProbeOutcome,
    {
        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| probe().into_outcome()));

        match outcome {
            Ok(Ok(true)) => {
                trace!(identity = %identity, "cache hit, bypassing throttle");
                self.metrics.record_cache_hit();
                true
            }
            Ok(Ok(false)) => false,
            Ok(Err(failure)) => {
                debug!(
                    identity = %identity,
                    error = %failure.message(),
                    "cache probe failed, treating call as not cached"
                );
                self.metrics.record_probe_failure();
                false
            }
            Err(_) => {
                debug!(
                    identity = %identity,
                    "cache probe panicked, treating call as not cached"
                );
                self.metrics.record_probe_failure();
                false
            }
        }
    }

    /// Wait until the identity may make an actual call, then record it.
    ///
    /// The identity's lock is held from the first check until the call is
    /// recorded, so concurrent callers of one identity are admitted one at a
    /// time and can never both see room in the window.
    async fn acquire<I>(&self, identity: &Identity, interrupt: &I) -> Result<(), I::Error>
    where
        I: Interrupt,
    {
        let slot = self.registry.ledger(identity);
        let mut ledger = interrupt.guard(slot.lock_owned()).await?;

        let config = self.registry.config();
        let clock = self.registry.clock();
        let window = config.window();
        let mut waited = Duration::ZERO;

        let mut now = clock.now();
        ledger.evict_expired(now, window);

        match config.wait_strategy() {
            WaitStrategy::Sequential => {
                if let Some(wait) = ledger.window_wait(now, config) {
                    now = self
                        .pause(identity, wait, WaitReason::Window, now, interrupt)
                        .await?;
                    waited += wait;
                    ledger.evict_expired(now, window);
                }
                if let Some(wait) = ledger.interval_wait(now, config) {
                    now = self
                        .pause(identity, wait, WaitReason::Interval, now, interrupt)
                        .await?;
                    waited += wait;
                }
            }
            WaitStrategy::Combined => {
                let window_wait = ledger.window_wait(now, config);
                let interval_wait = ledger.interval_wait(now, config);
                let longest = match (window_wait, interval_wait) {
                    (Some(w), Some(i)) if w >= i => Some((w, WaitReason::Window)),
                    (Some(w), None) => Some((w, WaitReason::Window)),
                    (_, Some(i)) => Some((i, WaitReason::Interval)),
                    (None, None) => None,
                };
                if let Some((wait, reason)) = longest {
                    now = self.pause(identity, wait, reason, now, interrupt).await?;
                    waited += wait;
                    ledger.evict_expired(now, window);
                }
            }
        }

        ledger.record(now);
        drop(ledger);

        self.metrics.record_throttled_call();
        if !waited.is_zero() {
            self.metrics.record_delay(waited);
        }

        Ok(())
    }

    /// Suspend the calling task for `wait` and return the resume time.
    ///
    /// The resume time is never earlier than `since + wait`, so a clock that
    /// lags the sleep cannot leave the ledger believing the wait is unserved.
    async fn pause<I>(
        &self,
        identity: &Identity,
        wait: Duration,
        reason: WaitReason,
        since: Instant,
        interrupt: &I,
    ) -> Result<Instant, I::Error>
    where
        I: Interrupt,
    {
        debug!(
            identity = %identity,
            reason = reason.as_str(),
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "rate limit reached, delaying call"
        );

        interrupt.guard(tokio::time::sleep(wait)).await?;
        Ok(self.registry.clock().now().max(since + wait))
    }

    fn cancelled(&self, identity: &Identity) -> WaitCancelled {
        debug!(identity = %identity, "rate-limited call cancelled while waiting");
        self.metrics.record_cancelled_wait();
        WaitCancelled {
            identity: identity.clone(),
        }
    }

    /// Describe an identity's current rate-limit state.
    ///
    /// Returns `None` for identities that have never made an actual call.
    pub async fn snapshot(&self, identity: impl Into<Identity>) -> Option<IdentitySnapshot> {
        self.registry.snapshot(&identity.into()).await
    }

    /// Get the number of identities tracked.
    pub fn identity_count(&self) -> usize {
        self.registry.len()
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &LimiterConfig {
        self.registry.config()
    }

    pub(crate) fn registry(&self) -> &IdentityRegistry<S> {
        &self.registry
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl<S> fmt::Debug for ThrottleGate<S>
where
    S: Storage<Identity, LedgerSlot> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleGate")
            .field("config", self.registry.config())
            .field("identities", &self.registry.len())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

/// Source of interruption for an admission wait.
trait Interrupt {
    type Error;

    /// Drive `fut` to completion unless interrupted first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Self::Error>;
}

/// Waits that always run to completion.
struct Uninterrupted;

impl Interrupt for Uninterrupted {
    type Error = Infallible;

    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Infallible> {
        Ok(fut.await)
    }
}

/// The token fired before the wait finished.
struct Interrupted;

impl Interrupt for CancellationToken {
    type Error = Interrupted;

    /// A future that is ready on first poll wins over an already cancelled
    /// token, so cancellation only ever interrupts a real wait.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            output = fut => Ok(output),
            _ = self.cancelled() => Err(Interrupted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::storage::ShardedStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn gate(max: usize, window: Duration, rate: f64) -> ThrottleGate {
        let config = LimiterConfig::new(max, window, rate).unwrap();
        let registry =
            IdentityRegistry::new(Arc::new(ShardedStorage::new()), Arc::new(SystemClock), config);
        ThrottleGate::new(registry, Metrics::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let gate = gate(3, Duration::from_secs(60), 10.0);
        let start = tokio::time::Instant::now();

        let value = gate.execute("x", || false, || async { 42 }).await;

        assert_eq!(value, 42);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.metrics().calls_throttled(), 1);
        assert_eq!(gate.metrics().calls_delayed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_passes_through() {
        let gate = gate(3, Duration::from_secs(60), 10.0);

        let result: Result<u32, String> = gate
            .execute("x", || false, || async { Err("provider returned 500".to_string()) })
            .await;

        assert_eq!(result, Err("provider returned 500".to_string()));
        // The failed call still consumed a slot
        assert_eq!(gate.snapshot("x").await.unwrap().calls_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_leaves_no_trace() {
        let gate = gate(1, Duration::from_secs(60), 1.0);

        gate.execute("x", || true, || async {}).await;

        assert!(gate.snapshot("x").await.is_none());
        assert_eq!(gate.identity_count(), 0);
        assert_eq!(gate.metrics().cache_hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_wait_is_enforced() {
        let gate = gate(10, Duration::from_secs(60), 5.0);
        let start = tokio::time::Instant::now();

        gate.execute("x", || false, || async {}).await;
        gate.execute("x", || false, || async {}).await;

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(210));
        assert_eq!(gate.metrics().calls_delayed(), 1);
        assert_eq!(gate.metrics().total_wait(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_wait_is_enforced() {
        let gate = gate(2, Duration::from_secs(10), 100.0);
        let start = tokio::time::Instant::now();

        for _ in 0..3 {
            gate.execute("x", || false, || async {}).await;
        }

        // Two calls 10ms apart, then the third waits for the first to age out
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
        assert!(gate.snapshot("x").await.unwrap().calls_in_window <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_combined_strategy_waits_for_longest() {
        let config = LimiterConfig::new(1, Duration::from_secs(2), 1.0)
            .unwrap()
            .with_wait_strategy(WaitStrategy::Combined);
        let registry =
            IdentityRegistry::new(Arc::new(ShardedStorage::new()), Arc::new(SystemClock), config);
        let gate = ThrottleGate::new(registry, Metrics::new());
        let start = tokio::time::Instant::now();

        gate.execute("x", || false, || async {}).await;
        gate.execute("x", || false, || async {}).await;

        // Window (2s) dominates the interval (1s); they are not summed
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_counts_as_miss() {
        let gate = gate(10, Duration::from_secs(60), 1.0);

        gate.execute("x", || Err::<bool, _>("cache offline"), || async {})
            .await;

        assert_eq!(gate.metrics().probe_failures(), 1);
        assert_eq!(gate.metrics().calls_throttled(), 1);
        assert_eq!(gate.metrics().cache_hits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_panic_counts_as_miss() {
        let gate = gate(10, Duration::from_secs(60), 1.0);
        let counter = AtomicUsize::new(0);
        let ran = &counter;

        gate.execute(
            "x",
            || -> bool { panic!("probe exploded") },
            || async move {
                ran.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(gate.metrics().probe_failures(), 1);
        assert_eq!(gate.snapshot("x").await.unwrap().calls_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_records_nothing() {
        let gate = gate(1, Duration::from_secs(60), 1.0);
        gate.execute("x", || false, || async {}).await;

        let token = CancellationToken::new();
        token.cancel();
        let counter = AtomicUsize::new(0);
        let ran = &counter;

        let result = gate
            .execute_with_cancellation(
                "x",
                || false,
                || async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                },
                &token,
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.identity().as_str(), "x");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(gate.metrics().waits_cancelled(), 1);
        assert_eq!(gate.snapshot("x").await.unwrap().calls_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_does_not_block_free_call() {
        let gate = gate(1, Duration::from_secs(60), 1.0);
        let token = CancellationToken::new();
        token.cancel();

        let result = gate
            .execute_with_cancellation("x", || false, || async { 7 }, &token)
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(gate.metrics().waits_cancelled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_ignores_cancelled_token() {
        let gate = gate(1, Duration::from_secs(60), 1.0);
        let token = CancellationToken::new();
        token.cancel();

        let result = gate
            .execute_with_cancellation("x", || true, || async { "cached" }, &token)
            .await;

        assert_eq!(result, Ok("cached"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninterrupted_wait_always_completes() {
        let start = tokio::time::Instant::now();

        let result = Uninterrupted
            .guard(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert!(matches!(result, Ok(())));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_interrupts_only_pending_waits() {
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(token.guard(async { 1 }).await, Ok(1)));
        assert!(matches!(
            token.guard(tokio::time::sleep(Duration::from_secs(1))).await,
            Err(Interrupted)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_without_token_serves_full_wait() {
        let gate = gate(1, Duration::from_secs(30), 10.0);
        let start = tokio::time::Instant::now();

        gate.execute("x", || false, || async {}).await;
        let value = gate.execute("x", || false, || async { "done" }).await;

        assert_eq!(value, "done");
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(gate.metrics().waits_cancelled(), 0);
    }

    #[test]
    fn test_wait_cancelled_display() {
        let err = WaitCancelled {
            identity: Identity::from("quotes"),
        };
        assert_eq!(
            err.to_string(),
            "call for identity `quotes` was cancelled while waiting on its rate limit"
        );
    }
}
