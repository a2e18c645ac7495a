//! Limiter configuration.
//!
//! A configuration fixes the two ceilings enforced for every identity: a
//! rolling-window call cap and a minimum spacing between consecutive calls.
//! It is validated once at construction and immutable afterwards.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Error returned when a limiter configuration is invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The rolling window must admit at least one call
    ZeroMaxCalls,
    /// The rolling window duration must be greater than zero
    ZeroWindow,
    /// The rolling window is longer than [`LimiterConfig::MAX_SPAN`]
    WindowTooLong,
    /// Calls per second must be finite and greater than zero
    InvalidCallsPerSecond(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMaxCalls => {
                write!(f, "max_calls_per_window must be greater than 0")
            }
            ConfigError::ZeroWindow => write!(f, "window duration must be greater than 0"),
            ConfigError::WindowTooLong => write!(
                f,
                "window duration must not exceed {} seconds",
                LimiterConfig::MAX_SPAN.as_secs()
            ),
            ConfigError::InvalidCallsPerSecond(rate) => {
                write!(
                    f,
                    "calls_per_second must be finite and greater than 0, got {}",
                    rate
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// How the window wait and the interval wait combine when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WaitStrategy {
    /// Wait out the window cap, then the interval floor. Total delay is the sum.
    #[default]
    Sequential,
    /// Suspend once for the longer of the two waits.
    Combined,
}

/// Validated, immutable limiter configuration.
///
/// # Example
/// ```
/// use throttle_gate::LimiterConfig;
/// use std::time::Duration;
///
/// // 5 calls per rolling minute, at most 5 calls per second
/// let config = LimiterConfig::new(5, Duration::from_secs(60), 5.0).unwrap();
/// assert_eq!(config.min_call_interval(), Duration::from_millis(200));
///
/// assert!(LimiterConfig::new(0, Duration::from_secs(60), 5.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    max_calls_per_window: usize,
    window: Duration,
    calls_per_second: f64,
    min_call_interval: Duration,
    wait_strategy: WaitStrategy,
}

impl LimiterConfig {
    /// Default rolling-window cap.
    pub const DEFAULT_MAX_CALLS_PER_WINDOW: usize = 5;
    /// Default rolling-window length.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
    /// Default calls-per-second ceiling.
    pub const DEFAULT_CALLS_PER_SECOND: f64 = 5.0;
    /// Longest window or minimum interval accepted (100 years).
    ///
    /// Waits are added to `Instant`s, which overflow far earlier than
    /// `Duration::MAX`.
    pub const MAX_SPAN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    /// Create a configuration.
    ///
    /// # Arguments
    /// * `max_calls_per_window` - Actual calls allowed inside any rolling window
    /// * `window` - Length of the rolling window
    /// * `calls_per_second` - Maximum call rate; the minimum interval is `1 / rate`
    ///
    /// # Errors
    /// Returns `ConfigError` if any limit is zero, negative or not finite, or
    /// if the window or the minimum interval exceeds [`LimiterConfig::MAX_SPAN`].
    pub fn new(
        max_calls_per_window: usize,
        window: Duration,
        calls_per_second: f64,
    ) -> Result<Self, ConfigError> {
        if max_calls_per_window == 0 {
            return Err(ConfigError::ZeroMaxCalls);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if window > Self::MAX_SPAN {
            return Err(ConfigError::WindowTooLong);
        }
        if !calls_per_second.is_finite() || calls_per_second <= 0.0 {
            return Err(ConfigError::InvalidCallsPerSecond(calls_per_second));
        }

        let min_call_interval = Duration::try_from_secs_f64(1.0 / calls_per_second)
            .ok()
            .filter(|interval| *interval <= Self::MAX_SPAN)
            .ok_or(ConfigError::InvalidCallsPerSecond(calls_per_second))?;

        Ok(Self {
            max_calls_per_window,
            window,
            calls_per_second,
            min_call_interval,
            wait_strategy: WaitStrategy::default(),
        })
    }

    /// Choose how the two waits combine.
    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Actual calls allowed inside any rolling window.
    pub fn max_calls_per_window(&self) -> usize {
        self.max_calls_per_window
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Configured calls-per-second ceiling.
    pub fn calls_per_second(&self) -> f64 {
        self.calls_per_second
    }

    /// Smallest allowed gap between two consecutive actual calls.
    pub fn min_call_interval(&self) -> Duration {
        self.min_call_interval
    }

    /// How the window and interval waits combine.
    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait_strategy
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: Self::DEFAULT_MAX_CALLS_PER_WINDOW,
            window: Self::DEFAULT_WINDOW,
            calls_per_second: Self::DEFAULT_CALLS_PER_SECOND,
            min_call_interval: Duration::from_millis(200),
            wait_strategy: WaitStrategy::Sequential,
        }
    }
}

/// Raw limiter settings as they appear in a configuration file.
///
/// Convert into a validated [`LimiterConfig`] with `TryFrom`.
///
/// ```
/// use throttle_gate::{LimiterConfig, LimiterSettings};
///
/// let settings: LimiterSettings = serde_json::from_str(
///     r#"{ "max_calls_per_window": 30, "window_secs": 60, "calls_per_second": 2 }"#,
/// ).unwrap();
/// let config = LimiterConfig::try_from(settings).unwrap();
/// assert_eq!(config.max_calls_per_window(), 30);
/// ```
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimiterSettings {
    pub max_calls_per_window: usize,
    pub window_secs: f64,
    pub calls_per_second: f64,
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
}

#[cfg(feature = "serde")]
impl TryFrom<LimiterSettings> for LimiterConfig {
    type Error = ConfigError;

    fn try_from(settings: LimiterSettings) -> Result<Self, Self::Error> {
        let window = match Duration::try_from_secs_f64(settings.window_secs) {
            Ok(window) => window,
            Err(_) if settings.window_secs > 0.0 => return Err(ConfigError::WindowTooLong),
            Err(_) => return Err(ConfigError::ZeroWindow),
        };
        Ok(LimiterConfig::new(
            settings.max_calls_per_window,
            window,
            settings.calls_per_second,
        )?
        .with_wait_strategy(settings.wait_strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval_derived_from_rate() {
        let config = LimiterConfig::new(3, Duration::from_secs(60), 10.0).unwrap();
        assert_eq!(config.min_call_interval(), Duration::from_millis(100));

        let config = LimiterConfig::new(3, Duration::from_secs(60), 0.5).unwrap();
        assert_eq!(config.min_call_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_zero_max_calls() {
        assert_eq!(
            LimiterConfig::new(0, Duration::from_secs(60), 5.0),
            Err(ConfigError::ZeroMaxCalls)
        );
    }

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(
            LimiterConfig::new(5, Duration::ZERO, 5.0),
            Err(ConfigError::ZeroWindow)
        );
    }

    #[test]
    fn test_rejects_degenerate_rates() {
        for rate in [0.0, -1.0, f64::INFINITY] {
            assert!(
                matches!(
                    LimiterConfig::new(5, Duration::from_secs(60), rate),
                    Err(ConfigError::InvalidCallsPerSecond(_))
                ),
                "rate {} should be rejected",
                rate
            );
        }
        assert!(LimiterConfig::new(5, Duration::from_secs(60), f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_windows_that_overflow_instants() {
        for window in [Duration::MAX, Duration::from_secs(u64::MAX / 2)] {
            assert_eq!(
                LimiterConfig::new(5, window, 5.0),
                Err(ConfigError::WindowTooLong)
            );
        }

        let longest = LimiterConfig::new(5, LimiterConfig::MAX_SPAN, 5.0).unwrap();
        assert_eq!(longest.window(), LimiterConfig::MAX_SPAN);
        assert!(std::time::Instant::now()
            .checked_add(longest.window() * 2)
            .is_some());
    }

    #[test]
    fn test_rejects_rates_with_unbounded_interval() {
        // One call per ~31k years
        assert_eq!(
            LimiterConfig::new(5, Duration::from_secs(60), 1e-12),
            Err(ConfigError::InvalidCallsPerSecond(1e-12))
        );
        assert!(LimiterConfig::new(5, Duration::from_secs(60), 1e-9).is_ok());
    }

    #[test]
    fn test_default_matches_constants() {
        let default = LimiterConfig::default();
        let built = LimiterConfig::new(
            LimiterConfig::DEFAULT_MAX_CALLS_PER_WINDOW,
            LimiterConfig::DEFAULT_WINDOW,
            LimiterConfig::DEFAULT_CALLS_PER_SECOND,
        )
        .unwrap();

        assert_eq!(default, built);
    }

    #[test]
    fn test_wait_strategy_defaults_to_sequential() {
        let config = LimiterConfig::new(5, Duration::from_secs(60), 5.0).unwrap();
        assert_eq!(config.wait_strategy(), WaitStrategy::Sequential);

        let config = config.with_wait_strategy(WaitStrategy::Combined);
        assert_eq!(config.wait_strategy(), WaitStrategy::Combined);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::ZeroWindow.to_string(),
            "window duration must be greater than 0"
        );
        assert!(ConfigError::InvalidCallsPerSecond(-2.0)
            .to_string()
            .contains("-2"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_conversion() {
        let settings: LimiterSettings = serde_json::from_str(
            r#"{
                "max_calls_per_window": 3,
                "window_secs": 60,
                "calls_per_second": 10,
                "wait_strategy": "combined"
            }"#,
        )
        .unwrap();

        let config = LimiterConfig::try_from(settings).unwrap();
        assert_eq!(config.max_calls_per_window(), 3);
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.min_call_interval(), Duration::from_millis(100));
        assert_eq!(config.wait_strategy(), WaitStrategy::Combined);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_reject_invalid_window() {
        let settings: LimiterSettings = serde_json::from_str(
            r#"{ "max_calls_per_window": 3, "window_secs": -1, "calls_per_second": 10 }"#,
        )
        .unwrap();

        assert_eq!(
            LimiterConfig::try_from(settings),
            Err(ConfigError::ZeroWindow)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_reject_huge_window() {
        let settings: LimiterSettings = serde_json::from_str(
            r#"{ "max_calls_per_window": 3, "window_secs": 1e30, "calls_per_second": 10 }"#,
        )
        .unwrap();

        assert_eq!(
            LimiterConfig::try_from(settings),
            Err(ConfigError::WindowTooLong)
        );
    }
}
