//! Gate construction.
//!
//! Wires the default adapters (sharded storage, system clock) together with a
//! validated configuration into a ready-to-use [`ThrottleGate`].

use crate::application::{
    gate::ThrottleGate, metrics::Metrics, ports::Clock, registry::IdentityRegistry,
};
use crate::domain::config::{ConfigError, LimiterConfig, WaitStrategy};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::storage::{DefaultStorage, ShardedStorage};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error returned when building a ThrottleGate fails.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Limiter configuration validation failed
    Config(ConfigError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(e) => write!(f, "limiter configuration error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Config(e) => Some(e),
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(e: ConfigError) -> Self {
        BuildError::Config(e)
    }
}

/// Builder for constructing a `ThrottleGate`.
pub struct ThrottleGateBuilder {
    max_calls_per_window: usize,
    window: Duration,
    calls_per_second: f64,
    wait_strategy: WaitStrategy,
    clock: Option<Arc<dyn Clock>>,
}

impl ThrottleGateBuilder {
    fn new() -> Self {
        Self {
            max_calls_per_window: LimiterConfig::DEFAULT_MAX_CALLS_PER_WINDOW,
            window: LimiterConfig::DEFAULT_WINDOW,
            calls_per_second: LimiterConfig::DEFAULT_CALLS_PER_SECOND,
            wait_strategy: WaitStrategy::default(),
            clock: None,
        }
    }

    /// Set how many actual calls an identity may make inside one rolling window.
    ///
    /// Default: 5
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_max_calls_per_window(mut self, max_calls: usize) -> Self {
        self.max_calls_per_window = max_calls;
        self
    }

    /// Set the length of the rolling window.
    ///
    /// Default: 60 seconds
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the maximum call rate; consecutive actual calls are spaced at least
    /// `1 / calls_per_second` apart.
    ///
    /// Default: 5.0
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_calls_per_second(mut self, calls_per_second: f64) -> Self {
        self.calls_per_second = calls_per_second;
        self
    }

    /// Set how the window and interval waits combine.
    ///
    /// Default: [`WaitStrategy::Sequential`], which sums the two waits.
    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Copy every limit from an existing configuration.
    pub fn with_config(mut self, config: &LimiterConfig) -> Self {
        self.max_calls_per_window = config.max_calls_per_window();
        self.window = config.window();
        self.calls_per_second = config.calls_per_second();
        self.wait_strategy = config.wait_strategy();
        self
    }

    /// Set a custom clock.
    ///
    /// Waits always sleep on tokio's timer, so the clock must advance with
    /// tokio time the way [`SystemClock`] does. A clock that lags behind is
    /// tolerated: a call recorded after a wait is stamped no earlier than the
    /// end of that wait, which moves its ledger ahead of the clock. Frozen
    /// clocks such as `MockClock` therefore suit snapshot and ledger tests
    /// rather than timing tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the gate.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<ThrottleGate, BuildError> {
        let config =
            LimiterConfig::new(self.max_calls_per_window, self.window, self.calls_per_second)?
                .with_wait_strategy(self.wait_strategy);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        Ok(ThrottleGate::with_parts(config, clock))
    }
}

impl fmt::Debug for ThrottleGateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleGateBuilder")
            .field("max_calls_per_window", &self.max_calls_per_window)
            .field("window", &self.window)
            .field("calls_per_second", &self.calls_per_second)
            .field("wait_strategy", &self.wait_strategy)
            .field("clock", &self.clock.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

impl ThrottleGate<DefaultStorage> {
    /// Create a builder with default limits.
    pub fn builder() -> ThrottleGateBuilder {
        ThrottleGateBuilder::new()
    }

    /// Create a gate from an already validated configuration.
    pub fn from_config(config: LimiterConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock::new()))
    }

    fn with_parts(config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let storage = Arc::new(ShardedStorage::new());
        let registry = IdentityRegistry::new(storage, clock, config);
        ThrottleGate::new(registry, Metrics::new())
    }
}
