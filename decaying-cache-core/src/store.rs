use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::CacheConfig;
use crate::entry::TimestampedValue;
use crate::error::{CacheError, Result};
use crate::fault::{FaultSink, SweepFault, TracingFaultSink};
use crate::race::InsertIfAbsent;

/// What a single sweep did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was still running, so this one did nothing
    Skipped,
    /// The scan finished and removed `removed` stale entries
    Completed { removed: usize },
    /// The scan panicked; the fault went to the cache's fault sink
    Faulted,
}

/// Internal shared state for the cache
struct CacheInner<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, TimestampedValue<V>>,
    /// Reference point for the entries' touch timestamps
    epoch: Instant,
    lifetime: Duration,
    force_reclaim: bool,
    /// Set while a sweep is scanning; later ticks skip instead of queueing
    sweeping: AtomicBool,
    fault_sink: Arc<dyn FaultSink>,
    /// Sender to signal shutdown to the sweep task
    shutdown_tx: watch::Sender<bool>,
}

/// Concurrent key/value cache whose idle entries decay away
///
/// Every successful [`try_lookup`](Self::try_lookup) refreshes the entry, so
/// entries in regular use never expire. A background task owned by this
/// instance sweeps every `sweep_interval` and drops entries that have not
/// been touched for `lifetime`. Expiry is approximate: an entry lives at least
/// `lifetime` after its last touch and at most about one sweep interval more.
///
/// Foreground operations never wait on the sweep beyond the per-shard locking
/// of the underlying `DashMap`.
///
/// The sweep task stops when the cache is shut down or dropped.
///
/// # Example
///
/// ```rust,no_run
/// use decaying_cache_core::DecayingCache;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = DecayingCache::new(Duration::from_secs(30)).unwrap();
///
///     cache.try_insert("session:7", 42);
///     assert_eq!(cache.try_lookup(&"session:7"), Some(42));
/// }
/// ```
pub struct DecayingCache<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> DecayingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache that sweeps every `lifetime / 2` without forcing
    /// reclamation.
    ///
    /// # Errors
    ///
    /// Fails if `lifetime` is below 250ms, or if called outside of a Tokio
    /// runtime context.
    pub fn new(lifetime: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(lifetime))
    }

    /// Creates a cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Self::with_fault_sink(config, Arc::new(TracingFaultSink))
    }

    /// Creates a cache whose sweep faults are handed to `fault_sink`
    pub fn with_fault_sink(config: CacheConfig, fault_sink: Arc<dyn FaultSink>) -> Result<Self> {
        config.validate()?;

        // The sweep task needs somewhere to run.
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(CacheInner {
            entries: DashMap::new(),
            epoch: Instant::now(),
            lifetime: config.lifetime,
            force_reclaim: config.force_reclaim,
            sweeping: AtomicBool::new(false),
            fault_sink,
            shutdown_tx,
        });

        runtime.spawn(Self::sweep_task(
            Arc::downgrade(&inner),
            config.sweep_interval,
            shutdown_rx,
        ));

        tracing::debug!(
            lifetime = ?config.lifetime,
            sweep_interval = ?config.sweep_interval,
            force_reclaim = config.force_reclaim,
            "decaying cache created"
        );

        Ok(Self { inner })
    }

    /// Background task that periodically sweeps stale entries
    ///
    /// Holds only a weak reference so that dropping the cache ends the task.
    async fn sweep_task(
        inner: Weak<CacheInner<K, V>>,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick - we want to wait for the interval first
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    // Scan on the blocking pool so a slow sweep never holds up
                    // the timer; overlapping ticks are turned away by the busy flag.
                    tokio::task::spawn_blocking(move || {
                        inner.sweep();
                    });
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("decaying cache sweep task stopped");
    }

    /// Inserts `value` under `key` if, and only if, the key is absent
    ///
    /// Returns `true` if the value was inserted. An existing entry is left
    /// untouched, including its freshness.
    pub fn try_insert(&self, key: K, value: V) -> bool {
        self.inner.insert_fresh(key, value)
    }

    /// Removes an entry, returning its value if it was present
    pub fn try_remove(&self, key: &K) -> Option<V> {
        self.inner
            .entries
            .remove(key)
            .map(|(_, entry)| entry.into_value())
    }

    /// Checks for a key without touching it
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Returns the number of entries, including ones the next sweep will drop
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` if the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns the configured lifetime
    pub fn lifetime(&self) -> Duration {
        self.inner.lifetime
    }

    /// Runs a sweep now, unless one is already in progress
    ///
    /// Note: This is also done automatically by the background task.
    pub fn sweep(&self) -> SweepOutcome {
        self.inner.sweep()
    }

    /// Stops the background sweep
    ///
    /// Entries stay in place and remain reachable; they simply no longer
    /// decay. A sweep already in progress is allowed to finish. This is called
    /// automatically when the cache is dropped.
    pub fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }
}

impl<K, V> DecayingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Retrieves the value for `key` and refreshes its freshness
    ///
    /// Returns `None` if the key was never inserted or has already decayed.
    pub fn try_lookup(&self, key: &K) -> Option<V> {
        self.inner.lookup(key)
    }
}

impl<K, V> InsertIfAbsent<K, V> for CacheInner<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn lookup(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        entry.touch(self.epoch, Instant::now());
        Some(entry.value().value().clone())
    }

    fn insert_if_absent(&self, key: K, value: V) -> bool {
        self.insert_fresh(key, value)
    }
}

impl<K, V> InsertIfAbsent<K, V> for DecayingCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn lookup(&self, key: &K) -> Option<V> {
        self.inner.lookup(key)
    }

    fn insert_if_absent(&self, key: K, value: V) -> bool {
        self.inner.insert_if_absent(key, value)
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash,
{
    fn insert_fresh(&self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(TimestampedValue::new(value, self.epoch, Instant::now()));
                true
            }
        }
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn sweep(&self) -> SweepOutcome {
        let Some(_busy) = BusyFlag::acquire(&self.sweeping) else {
            tracing::trace!("previous sweep still running, skipping");
            return SweepOutcome::Skipped;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.remove_stale())) {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.entries.len(), "swept stale entries");
                    if self.force_reclaim {
                        self.entries.shrink_to_fit();
                    }
                }
                SweepOutcome::Completed { removed }
            }
            Err(payload) => {
                self.fault_sink.report(&SweepFault::from_panic(payload));
                SweepOutcome::Faulted
            }
        }
    }

    fn remove_stale(&self) -> usize {
        // An unbounded lifetime has no cutoff.
        let Some(cutoff) = Instant::now().checked_sub(self.lifetime) else {
            return 0;
        };

        // Collect first: removing while iterating would deadlock on the shard.
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| entry.value().touched_before(self.epoch, cutoff))
            .map(|entry| entry.key().clone())
            .collect();

        // Re-check under the write lock so an entry touched since the scan survives.
        stale
            .into_iter()
            .filter(|key| {
                self.entries
                    .remove_if(key, |_, entry| entry.touched_before(self.epoch, cutoff))
                    .is_some()
            })
            .count()
    }
}

impl<K, V> Drop for CacheInner<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // Signal the sweep task to stop when the cache is dropped
        self.shutdown_tx.send_replace(true);
    }
}

/// Clears the busy flag on every exit path, including unwinding.
struct BusyFlag<'a>(&'a AtomicBool);

impl<'a> BusyFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
