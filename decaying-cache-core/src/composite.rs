//! Two-level caches addressed by `(major, minor, sub)` identifiers.
//!
//! The `(major, minor)` pair selects a group held in a [`DecayingCache`];
//! the sub-key selects a leaf inside that group. Touching any leaf keeps its
//! whole group alive, and an idle group decays with every leaf under it.

use std::fmt;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::fault::{FaultSink, TracingFaultSink};
use crate::leaf::{KeyedLeafCache, Leaf};
use crate::race;
use crate::store::{DecayingCache, SweepOutcome};

/// Two 32-bit identifiers packed into one 64-bit key.
///
/// `major` occupies the high half and `minor` the low half, so every pair
/// maps to a distinct key, negative identifiers included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey(u64);

impl CompositeKey {
    pub fn new(major: i32, minor: i32) -> Self {
        Self(((major as u32 as u64) << 32) | minor as u32 as u64)
    }

    pub fn major(self) -> i32 {
        (self.0 >> 32) as u32 as i32
    }

    pub fn minor(self) -> i32 {
        self.0 as u32 as i32
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.major(), self.minor())
    }
}

/// A decaying cache of leaf groups
pub struct CompositeCache<L: Leaf> {
    groups: DecayingCache<CompositeKey, Arc<KeyedLeafCache<L>>>,
}

impl<L: Leaf> CompositeCache<L> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_fault_sink(config, Arc::new(TracingFaultSink))
    }

    pub fn with_fault_sink(config: CacheConfig, fault_sink: Arc<dyn FaultSink>) -> Result<Self> {
        Ok(Self {
            groups: DecayingCache::with_fault_sink(config, fault_sink)?,
        })
    }

    /// Returns the leaf `sub` of group `(major, minor)`, creating either if needed
    ///
    /// Refreshes the group, postponing its decay.
    pub fn lookup(&self, major: i32, minor: i32, sub: i32) -> Arc<L> {
        self.group(major, minor).get_or_create(sub)
    }

    /// Returns the group `(major, minor)`, creating it if needed
    pub fn group(&self, major: i32, minor: i32) -> Arc<KeyedLeafCache<L>> {
        let key = CompositeKey::new(major, minor);
        race::get_or_insert_with(&self.groups, key, || {
            tracing::trace!(group = %key, "creating leaf group");
            Arc::new(KeyedLeafCache::new())
        })
    }

    /// Drops a group and every leaf in it. Returns whether it existed.
    pub fn remove_group(&self, major: i32, minor: i32) -> bool {
        self.groups
            .try_remove(&CompositeKey::new(major, minor))
            .is_some()
    }

    /// Checks for a group without refreshing it
    #[must_use]
    pub fn contains_group(&self, major: i32, minor: i32) -> bool {
        self.groups.contains_key(&CompositeKey::new(major, minor))
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Runs a sweep of idle groups now
    pub fn sweep(&self) -> SweepOutcome {
        self.groups.sweep()
    }

    /// Stops the background sweep
    pub fn shutdown(&self) {
        self.groups.shutdown();
    }
}
