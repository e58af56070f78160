//! Error types for cache construction.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while building a cache.
///
/// Lookups never fail: a missing key is reported as `None`/`false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The configured lifetime is below the supported minimum
    #[error("lifetime {lifetime:?} is shorter than the minimum of {minimum:?}")]
    LifetimeTooShort {
        lifetime: Duration,
        minimum: Duration,
    },

    /// The configured sweep interval is below the supported minimum
    #[error("sweep interval {interval:?} is shorter than the minimum of {minimum:?}")]
    SweepIntervalTooShort {
        interval: Duration,
        minimum: Duration,
    },

    /// No Tokio runtime is available to host the sweep task
    #[error("a decaying cache must be created from within a Tokio runtime")]
    NoRuntime,
}

impl CacheError {
    /// Returns `true` if the error comes from an out-of-range setting.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            CacheError::LifetimeTooShort { .. } | CacheError::SweepIntervalTooShort { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
