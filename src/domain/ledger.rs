//! Per-identity call ledger.
//!
//! The ledger records the timestamps of actual (non-cached) calls for one
//! identity. It answers two questions for the gate: how long a new call must
//! wait for the rolling window to admit it, and how long it must wait for the
//! minimum interval since the previous call to elapse.
//!
//! All methods are pure with respect to time: the caller passes `now`, which
//! keeps the ledger deterministic under test.

use crate::domain::config::{LimiterConfig, WaitStrategy};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Which constraint a wait is enforcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// The rolling window is full
    Window,
    /// The previous call was too recent
    Interval,
}

impl WaitReason {
    /// Short label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitReason::Window => "window",
            WaitReason::Interval => "interval",
        }
    }
}

/// Timestamps of actual calls made under one identity.
///
/// # Example
/// ```
/// use throttle_gate::{CallLedger, LimiterConfig};
/// use std::time::{Duration, Instant};
///
/// let config = LimiterConfig::new(2, Duration::from_secs(60), 10.0).unwrap();
/// let mut ledger = CallLedger::new();
/// let start = Instant::now();
///
/// ledger.record(start);
/// ledger.record(start + Duration::from_secs(1));
///
/// // Window is full: the next call waits for the first entry to age out
/// let now = start + Duration::from_secs(2);
/// assert_eq!(ledger.window_wait(now, &config), Some(Duration::from_secs(58)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallLedger {
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl CallLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries that have aged out of the window ending at `now`.
    ///
    /// An entry exactly `window` old is outside the window. Only the front is
    /// inspected since entries are time ordered.
    pub fn evict_expired(&mut self, now: Instant, window: Duration) -> usize {
        let mut evicted = 0;
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.calls.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }
        evicted
    }

    /// Time until the window admits another call, if it is currently full.
    ///
    /// Callers should evict first; stale entries would otherwise count toward
    /// the cap.
    pub fn window_wait(&self, now: Instant, config: &LimiterConfig) -> Option<Duration> {
        if self.calls.len() < config.max_calls_per_window() {
            return None;
        }
        let oldest = *self.calls.front()?;
        let elapsed = now.saturating_duration_since(oldest);
        config
            .window()
            .checked_sub(elapsed)
            .filter(|wait| !wait.is_zero())
    }

    /// Time until the minimum interval since the last call has elapsed.
    pub fn interval_wait(&self, now: Instant, config: &LimiterConfig) -> Option<Duration> {
        let last = self.last_call?;
        let since_last = now.saturating_duration_since(last);
        config
            .min_call_interval()
            .checked_sub(since_last)
            .filter(|wait| !wait.is_zero())
    }

    /// Record an actual call made at `now`.
    pub fn record(&mut self, now: Instant) {
        self.calls.push_back(now);
        self.last_call = Some(now);
    }

    /// Number of calls currently held in the ledger.
    ///
    /// Entries are only purged on inspection, so this may include calls that
    /// have already aged out. See [`CallLedger::calls_within`].
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no calls are held.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Count calls inside the window ending at `now`, without evicting.
    pub fn calls_within(&self, now: Instant, window: Duration) -> usize {
        self.calls
            .iter()
            .filter(|&&call| now.saturating_duration_since(call) < window)
            .count()
    }

    /// Timestamp of the oldest call held.
    pub fn oldest(&self) -> Option<Instant> {
        self.calls.front().copied()
    }

    /// Timestamp of the most recent actual call.
    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }

    /// Delay an actual call made at `now` would currently incur.
    ///
    /// Read-only: the ledger is not evicted. Follows the configured wait
    /// strategy, so sequential waits are summed.
    pub fn projected_delay(&self, now: Instant, config: &LimiterConfig) -> Duration {
        let mut live = self.clone();
        live.evict_expired(now, config.window());

        let window_wait = live.window_wait(now, config).unwrap_or_default();
        match config.wait_strategy() {
            WaitStrategy::Sequential => {
                let resumed = now + window_wait;
                live.evict_expired(resumed, config.window());
                window_wait + live.interval_wait(resumed, config).unwrap_or_default()
            }
            WaitStrategy::Combined => {
                window_wait.max(live.interval_wait(now, config).unwrap_or_default())
            }
        }
    }
}
