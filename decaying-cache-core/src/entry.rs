use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A stored value with the moment it was last touched
///
/// The timestamp is kept as nanoseconds since the owning cache's epoch so it
/// can live in an atomic and be refreshed through a shared reference.
#[derive(Debug)]
pub(crate) struct TimestampedValue<V> {
    value: V,
    last_touch: AtomicU64,
}

impl<V> TimestampedValue<V> {
    /// Creates a value touched at `now` (relative to `epoch`)
    pub(crate) fn new(value: V, epoch: Instant, now: Instant) -> Self {
        Self {
            value,
            last_touch: AtomicU64::new(ticks_since(epoch, now)),
        }
    }

    /// Returns the stored value
    pub(crate) fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the wrapper and returns the stored value
    pub(crate) fn into_value(self) -> V {
        self.value
    }

    /// Returns the last touch as an instant
    pub(crate) fn last_touch(&self, epoch: Instant) -> Instant {
        epoch + Duration::from_nanos(self.last_touch.load(Ordering::Acquire))
    }

    /// Moves the last touch forward to `now`.
    ///
    /// Never moves it backwards, even if a slower thread arrives with an
    /// older reading of the clock.
    pub(crate) fn touch(&self, epoch: Instant, now: Instant) {
        self.last_touch
            .fetch_max(ticks_since(epoch, now), Ordering::AcqRel);
    }

    /// Checks whether the last touch happened strictly before `cutoff`
    pub(crate) fn touched_before(&self, epoch: Instant, cutoff: Instant) -> bool {
        self.last_touch(epoch) < cutoff
    }
}

fn ticks_since(epoch: Instant, at: Instant) -> u64 {
    let nanos = at.saturating_duration_since(epoch).as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX)
}
