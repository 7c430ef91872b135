//! Keyed in-memory registries owned by the host.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A concurrent map from an execution id to per-execution state.
///
/// Values are cloned out on lookup; store an `Arc` for state that must be
/// shared or mutated.
#[derive(Debug)]
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `key`.
    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Returns a clone of the entry for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Removes and returns the entry for `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    /// Removes all entries for which `remove` returns true.
    ///
    /// Returns the number of removed entries.
    pub fn remove_where<F>(&self, mut remove: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|k, v| !remove(k, v));
        before - entries.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
