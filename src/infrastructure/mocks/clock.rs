//! Manually driven clock.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock whose time only moves when a test moves it.
///
/// Useful for exercising ledger and snapshot arithmetic without sleeping.
/// Note that the gate itself waits with `tokio::time::sleep`; tests that drive
/// [`ThrottleGate`](crate::ThrottleGate) end to end should prefer
/// [`SystemClock`](crate::SystemClock) under a paused tokio runtime.
///
/// Clones share the same time value.
///
/// # Examples
///
/// ```
/// use throttle_gate::infrastructure::mocks::MockClock;
/// use throttle_gate::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// let shared = clock.clone();
///
/// shared.advance(Duration::from_secs(61));
/// assert_eq!(clock.now(), start + Duration::from_secs(61));
/// assert_eq!(clock.elapsed(), Duration::from_secs(61));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    now: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    /// Jump to an exact instant. Moving backwards is allowed.
    pub fn set(&self, instant: Instant) {
        *self.lock() = instant;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.lock().saturating_duration_since(self.start)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.now
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}
