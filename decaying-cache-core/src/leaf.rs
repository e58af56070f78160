use dashmap::DashMap;
use std::sync::Arc;

use crate::race;

/// A terminal cached object created lazily on first request.
pub trait Leaf: Send + Sync + 'static {
    /// Builds an empty, uninitialized leaf for `id`.
    fn with_id(id: i32) -> Self;

    fn id(&self) -> i32;
}

/// Leaves of one group, indexed by an integer sub-key
///
/// There is no expiry per leaf: the whole group is dropped at once by the
/// decaying cache that owns it. Concurrent callers asking for the same
/// sub-key always receive the same `Arc`.
pub struct KeyedLeafCache<L> {
    leaves: DashMap<i32, Arc<L>>,
}

impl<L: Leaf> KeyedLeafCache<L> {
    pub fn new() -> Self {
        Self {
            leaves: DashMap::new(),
        }
    }

    /// Returns the leaf for `id`, creating an empty one if needed
    pub fn get_or_create(&self, id: i32) -> Arc<L> {
        race::get_or_insert_with(&self.leaves, id, || {
            let leaf = L::with_id(id);
            tracing::trace!(id = leaf.id(), "creating leaf");
            Arc::new(leaf)
        })
    }

    /// Returns the leaf for `id` without creating it
    pub fn get(&self, id: i32) -> Option<Arc<L>> {
        self.leaves.get(&id).map(|leaf| Arc::clone(leaf.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl<L: Leaf> Default for KeyedLeafCache<L> {
    fn default() -> Self {
        Self::new()
    }
}
