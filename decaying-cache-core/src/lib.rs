//! # Decaying Cache Core
//!
//! Concurrent in-memory caches whose entries decay once nobody touches them.
//!
//! ## Features
//!
//! - Thread-safe storage using `DashMap` (no locks held across operations)
//! - Every lookup refreshes the entry it returns
//! - Background sweep task per cache instance, skipped while a previous
//!   sweep is still running
//! - Insert-if-absent creation: racing callers always end up sharing one value
//! - Two-level caches keyed by `(major, minor, sub)` where a whole
//!   `(major, minor)` group decays as a unit
//!
//! ## Example
//!
//! ```rust,no_run
//! use decaying_cache_core::{CacheConfig, GlobalParameterCache, TableDataCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Sources idle for 30 seconds are dropped, checked every 15 seconds
//!     let parameters = GlobalParameterCache::<f64>::new(Duration::from_secs(30)).unwrap();
//!
//!     let load = parameters.get_parameter(12, 400, 1001);
//!     {
//!         let mut value = load.lock();
//!         *value = 0.75;
//!     }
//!     load.set_initialized(true);
//!
//!     // Or with custom sweep settings
//!     let config = CacheConfig::new(Duration::from_secs(60))
//!         .with_sweep_interval(Duration::from_secs(5));
//!     let tables = TableDataCache::with_config(config).unwrap();
//!
//!     let interfaces = tables.get_table(12, 400, 2000);
//!     if !interfaces.is_initialized() {
//!         // load rows, then mark the table initialized
//!         interfaces.set_initialized(true);
//!     }
//! }
//! ```

mod composite;
mod config;
mod entry;
mod error;
mod fault;
mod leaf;
mod parameter;
mod race;
mod store;
mod table;

pub use composite::{CompositeCache, CompositeKey};
pub use config::{CacheConfig, MAX_SWEEP_INTERVAL, MIN_LIFETIME, MIN_SWEEP_INTERVAL};
pub use error::{CacheError, Result};
pub use fault::{FaultSink, SweepFault, TracingFaultSink};
pub use leaf::{KeyedLeafCache, Leaf};
pub use parameter::{CachedParameter, GlobalParameterCache};
pub use race::{get_or_insert_with, InsertIfAbsent};
pub use store::{DecayingCache, SweepOutcome};
pub use table::{CachedTable, Rows, TableDataCache};
