use std::time::Duration;

use crate::error::{CacheError, Result};

/// Shortest lifetime a cache accepts.
pub const MIN_LIFETIME: Duration = Duration::from_millis(250);

/// Shortest interval between two sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Sweep interval used by [`CacheConfig::never_expire`].
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

const DEFAULT_LIFETIME: Duration = Duration::from_secs(60);

/// Configuration for a decaying cache and its background sweep
///
/// # Example
///
/// ```rust
/// use decaying_cache_core::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new(Duration::from_secs(10))
///     .with_sweep_interval(Duration::from_secs(2))
///     .with_force_reclaim(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry survives without being touched
    pub lifetime: Duration,

    /// Interval between sweeps (default: half the lifetime)
    pub sweep_interval: Duration,

    /// Release spare map capacity after a sweep that removed something
    pub force_reclaim: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LIFETIME)
    }
}

impl CacheConfig {
    /// Creates a configuration that sweeps every `lifetime / 2` without
    /// forcing reclamation.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            sweep_interval: lifetime / 2,
            force_reclaim: false,
        }
    }

    /// A configuration whose entries never decay.
    ///
    /// The sweep still runs, it just never finds anything old enough.
    pub fn never_expire() -> Self {
        Self::new(Duration::MAX).with_sweep_interval(MAX_SWEEP_INTERVAL)
    }

    /// Sets the interval between sweeps
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets whether spare capacity is released after a productive sweep
    pub fn with_force_reclaim(mut self, force_reclaim: bool) -> Self {
        self.force_reclaim = force_reclaim;
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// Reads:
    /// - `DECAYING_CACHE_LIFETIME_MS` - Entry lifetime (defaults to 60000)
    /// - `DECAYING_CACHE_SWEEP_INTERVAL_MS` - Sweep interval (defaults to half the lifetime)
    /// - `DECAYING_CACHE_FORCE_RECLAIM` - `true`/`false` (defaults to false)
    pub fn from_env() -> Self {
        let lifetime = env_millis("DECAYING_CACHE_LIFETIME_MS").unwrap_or(DEFAULT_LIFETIME);
        let mut config = Self::new(lifetime);

        if let Some(interval) = env_millis("DECAYING_CACHE_SWEEP_INTERVAL_MS") {
            config.sweep_interval = interval;
        }

        config.force_reclaim = std::env::var("DECAYING_CACHE_FORCE_RECLAIM")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(false);

        config
    }

    /// Checks the lower bounds on lifetime and sweep interval.
    pub fn validate(&self) -> Result<()> {
        if self.lifetime < MIN_LIFETIME {
            return Err(CacheError::LifetimeTooShort {
                lifetime: self.lifetime,
                minimum: MIN_LIFETIME,
            });
        }

        if self.sweep_interval < MIN_SWEEP_INTERVAL {
            return Err(CacheError::SweepIntervalTooShort {
                interval: self.sweep_interval,
                minimum: MIN_SWEEP_INTERVAL,
            });
        }

        Ok(())
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_half_the_lifetime() {
        let config = CacheConfig::new(Duration::from_millis(500));
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert!(!config.force_reclaim);
    }

    #[test]
    fn test_long_lifetime_interval_not_capped() {
        let lifetime = Duration::from_secs(4 * 3600);
        let config = CacheConfig::new(lifetime);
        assert_eq!(config.sweep_interval, lifetime / 2);
    }

    #[test]
    fn test_builder_pattern_chaining() {
        let config = CacheConfig::new(Duration::from_secs(4))
            .with_sweep_interval(Duration::from_secs(1))
            .with_force_reclaim(true);
        assert_eq!(config.lifetime, Duration::from_secs(4));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(config.force_reclaim);
    }

    #[test]
    fn test_minimum_lifetime_accepted() {
        assert!(CacheConfig::new(MIN_LIFETIME).validate().is_ok());
    }

    #[test]
    fn test_short_lifetime_rejected() {
        let err = CacheConfig::new(Duration::from_millis(249))
            .validate()
            .unwrap_err();
        assert!(matches!(err, CacheError::LifetimeTooShort { .. }));
        assert!(err.is_out_of_range());
        assert!(!CacheError::NoRuntime.is_out_of_range());
    }

    #[test]
    fn test_short_interval_rejected() {
        let err = CacheConfig::new(Duration::from_secs(1))
            .with_sweep_interval(Duration::from_millis(99))
            .validate()
            .unwrap_err();
        assert!(matches!(err, CacheError::SweepIntervalTooShort { .. }));
        assert!(err.is_out_of_range());
    }

    #[test]
    fn test_never_expire_has_schedulable_interval() {
        let config = CacheConfig::never_expire();
        assert_eq!(config.lifetime, Duration::MAX);
        assert_eq!(config.sweep_interval, MAX_SWEEP_INTERVAL);
        assert!(config.validate().is_ok());
    }
}
