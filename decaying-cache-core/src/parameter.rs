use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::composite::CompositeCache;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::leaf::Leaf;

/// A cached parameter value plus its initialization state
///
/// The cache only guarantees that one `CachedParameter` exists per
/// parameter. Keeping the value consistent across several steps is up to
/// the caller, who should hold [`lock`](Self::lock) for the duration.
#[derive(Debug)]
pub struct CachedParameter<T> {
    parameter_id: i32,
    initialized: AtomicBool,
    value: Mutex<T>,
}

impl<T: Default> CachedParameter<T> {
    /// Creates an empty parameter holding `T::default()`
    pub fn new(parameter_id: i32) -> Self {
        Self {
            parameter_id,
            initialized: AtomicBool::new(false),
            value: Mutex::new(T::default()),
        }
    }
}

impl<T> CachedParameter<T> {
    pub fn parameter_id(&self) -> i32 {
        self.parameter_id
    }

    /// Whether a value has been stored since the parameter was created
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }

    /// Locks the value for reading or writing
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the value and marks the parameter initialized
    pub fn set(&self, value: T) {
        *self.lock() = value;
        self.set_initialized(true);
    }
}

impl<T: Clone> CachedParameter<T> {
    /// Returns a copy of the current value
    pub fn get(&self) -> T {
        self.lock().clone()
    }
}

impl<T> Leaf for CachedParameter<T>
where
    T: Default + Send + 'static,
{
    fn with_id(id: i32) -> Self {
        Self::new(id)
    }

    fn id(&self) -> i32 {
        self.parameter_id
    }
}

/// Parameter values cached per `(major, minor)` source
///
/// A source whose parameters have not been requested for the configured
/// lifetime is dropped along with all of its parameters. Pick the lifetime
/// from how often sources are polled; a few poll cycles lets an inactive
/// source go quickly without losing data for a slow one.
///
/// # Example
///
/// ```rust,no_run
/// use decaying_cache_core::GlobalParameterCache;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = GlobalParameterCache::<i64>::new(Duration::from_secs(30)).unwrap();
///
///     let parameter = cache.get_parameter(12, 400, 1001);
///     if !parameter.is_initialized() {
///         parameter.set(17);
///     }
/// }
/// ```
pub struct GlobalParameterCache<T>
where
    T: Default + Send + 'static,
{
    sources: CompositeCache<CachedParameter<T>>,
}

impl<T> GlobalParameterCache<T>
where
    T: Default + Send + 'static,
{
    /// Creates a cache that sweeps every `lifetime / 2`
    ///
    /// # Errors
    ///
    /// Fails if `lifetime` is below 250ms, or if called outside of a Tokio
    /// runtime context.
    pub fn new(lifetime: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(lifetime))
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            sources: CompositeCache::new(config)?,
        })
    }

    /// Returns the parameter, creating an uninitialized one if needed
    ///
    /// Refreshes the `(major_id, minor_id)` source, postponing its removal.
    pub fn get_parameter(
        &self,
        major_id: i32,
        minor_id: i32,
        parameter_id: i32,
    ) -> Arc<CachedParameter<T>> {
        self.sources.lookup(major_id, minor_id, parameter_id)
    }

    /// Number of sources currently cached
    pub fn source_count(&self) -> usize {
        self.sources.group_count()
    }

    /// Stops the background sweep
    pub fn shutdown(&self) {
        self.sources.shutdown();
    }
}
