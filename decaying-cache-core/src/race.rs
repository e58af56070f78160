//! Insert-if-absent resolution shared by every cache layer.
//!
//! Callers racing to create the value for one key may each build a
//! candidate, but only the first candidate to be inserted is ever handed out.
//! Losers drop their candidate and return the winner.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

/// A concurrent map offering atomic lookup and insert-if-absent.
pub trait InsertIfAbsent<K, V> {
    /// Returns a handle to the current value, if any.
    fn lookup(&self, key: &K) -> Option<V>;

    /// Inserts `value` only if `key` is absent. Returns whether it did.
    fn insert_if_absent(&self, key: K, value: V) -> bool;
}

impl<K, V> InsertIfAbsent<K, V> for DashMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn lookup(&self, key: &K) -> Option<V> {
        self.get(key).map(|entry| entry.value().clone())
    }

    fn insert_if_absent(&self, key: K, value: V) -> bool {
        match self.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

/// Returns the value for `key`, creating it with `make` if absent.
///
/// `make` runs at most once per call, and its result is only published if
/// no other caller got there first. No lock is held between attempts.
pub fn get_or_insert_with<M, K, V, F>(map: &M, key: K, make: F) -> V
where
    M: InsertIfAbsent<K, V> + ?Sized,
    K: Clone,
    V: Clone,
    F: FnOnce() -> V,
{
    if let Some(existing) = map.lookup(&key) {
        return existing;
    }

    let candidate = make();
    loop {
        if map.insert_if_absent(key.clone(), candidate.clone()) {
            return candidate;
        }

        // Lost the race. The winner may already have been removed again,
        // in which case the same candidate gets another attempt.
        if let Some(existing) = map.lookup(&key) {
            return existing;
        }
    }
}
