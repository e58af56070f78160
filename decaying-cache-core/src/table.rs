use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::composite::CompositeCache;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::leaf::Leaf;

/// Row storage: primary key to the row's column values
pub type Rows = HashMap<String, Vec<Value>>;

/// A cached table plus its initialization state
///
/// Check [`is_initialized`](Self::is_initialized) to find out whether rows
/// were loaded already. Hold [`lock`](Self::lock) while filling or reading
/// the rows.
#[derive(Debug)]
pub struct CachedTable {
    parameter_id: i32,
    initialized: AtomicBool,
    rows: Mutex<Rows>,
}

impl CachedTable {
    pub fn new(parameter_id: i32) -> Self {
        Self {
            parameter_id,
            initialized: AtomicBool::new(false),
            rows: Mutex::new(Rows::new()),
        }
    }

    pub fn parameter_id(&self) -> i32 {
        self.parameter_id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }

    /// Locks the rows for reading or writing
    pub fn lock(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Leaf for CachedTable {
    fn with_id(id: i32) -> Self {
        Self::new(id)
    }

    fn id(&self) -> i32 {
        self.parameter_id
    }
}

/// Table data cached per `(major, minor)` source
///
/// Built with [`TableDataCache::new`] the tables never decay; with a
/// lifetime, sources that go unused for that long are dropped.
pub struct TableDataCache {
    sources: CompositeCache<CachedTable>,
}

impl TableDataCache {
    /// Creates a cache whose tables never decay
    ///
    /// # Errors
    ///
    /// Fails if called outside of a Tokio runtime context.
    pub fn new() -> Result<Self> {
        Self::with_config(CacheConfig::never_expire())
    }

    /// Creates a cache that drops sources idle for `lifetime`
    pub fn with_lifetime(lifetime: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(lifetime))
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            sources: CompositeCache::new(config)?,
        })
    }

    /// Returns the table, creating an empty one if needed
    ///
    /// Refreshes the `(major_id, minor_id)` source, postponing its removal.
    pub fn get_table(&self, major_id: i32, minor_id: i32, parameter_id: i32) -> Arc<CachedTable> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde_json::json;
    use std::thread;

    /// Builds a cache inside a leaked runtime that keeps its sweep running
    fn create_test_cache(build: impl FnOnce() -> Result<TableDataCache>) -> Result<TableDataCache> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let rt = Box::leak(Box::new(rt));
        let _guard = rt.enter();

        build()
    }

    #[test]
    fn test_stale_timer_refresh() {
        let cache =
            create_test_cache(|| TableDataCache::with_lifetime(Duration::from_millis(250))).unwrap();

        cache.get_table(1, 1, 1).set_initialized(true);

        thread::sleep(Duration::from_millis(200));
        assert!(cache.get_table(1, 1, 1).is_initialized());

        thread::sleep(Duration::from_millis(200));
        assert!(cache.get_table(1, 1, 1).is_initialized());

        // Wait for several sweeps with no access; looking too early would
        // just extend the lifetime again.
        thread::sleep(Duration::from_millis(400));
        assert!(!cache.get_table(1, 1, 1).is_initialized());
    }

    #[test]
    fn test_never_expiring_tables_survive() {
        let cache = create_test_cache(TableDataCache::new).unwrap();

        cache.get_table(3, 3, 3).set_initialized(true);
        thread::sleep(Duration::from_millis(300));

        assert!(cache.get_table(3, 3, 3).is_initialized());
    }

    #[test]
    fn test_rows_hold_mixed_columns() {
        let cache = create_test_cache(TableDataCache::new).unwrap();

        {
            let table = cache.get_table(1, 5, 2000);
            let mut rows = table.lock();
            rows.insert("1".to_string(), vec![json!(1), json!("eth0"), json!(12.5)]);
            rows.insert("2".to_string(), vec![json!(2), json!("eth1"), Value::Null]);
            table.set_initialized(true);
        }

        let table = cache.get_table(1, 5, 2000);
        let rows = table.lock();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows["1"][1], json!("eth0"));
        assert_eq!(rows["2"][2], Value::Null);
    }

    #[test]
    fn test_tables_isolated_per_source() {
        let cache = create_test_cache(TableDataCache::new).unwrap();

        cache
            .get_table(1, 1, 100)
            .lock()
            .insert("a".to_string(), vec![json!("first")]);

        assert!(cache.get_table(1, 2, 100).lock().is_empty());
        assert!(cache.get_table(2, 1, 100).lock().is_empty());
        assert!(cache.get_table(1, 1, 101).lock().is_empty());
        assert_eq!(cache.get_table(1, 1, 100).lock().len(), 1);
        assert_eq!(cache.source_count(), 3);
    }

    #[test]
    fn test_short_lifetime_rejected() {
        let result = create_test_cache(|| TableDataCache::with_lifetime(Duration::from_millis(10)));
        assert!(matches!(result, Err(CacheError::LifetimeTooShort { .. })));
    }
}
