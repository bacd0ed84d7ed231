//! Tracking set of plugin names believed to be cached.
//!
//! Each name carries the generation of the entry that put it there, so an
//! eviction notice for an older entry cannot untrack a newer reload.

use std::collections::BTreeSet;

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct TrackingSet {
    entries: DashMap<String, u64>,
}

impl TrackingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, generation: u64) {
        self.entries.insert(name.to_string(), generation);
    }

    /// Untrack `name` regardless of generation.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Untrack `name` only if it is still tracked at `generation`.
    pub fn remove_generation(&self, name: &str, generation: u64) -> bool {
        self.entries
            .remove_if(name, |_, tracked| *tracked == generation)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|entry| *entry.value())
    }

    /// Point-in-time copy of `(name, generation)` pairs. No shard locks are held
    /// once this returns.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_generation_does_not_untrack() {
        let set = TrackingSet::new();
        set.insert("demo", 1);
        set.insert("demo", 2);

        assert!(!set.remove_generation("demo", 1));
        assert!(set.contains("demo"));
        assert!(set.remove_generation("demo", 2));
        assert!(set.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let set = TrackingSet::new();
        set.insert("a", 1);
        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert!(!set.remove("never-added"));
    }

    #[test]
    fn names_are_sorted() {
        let set = TrackingSet::new();
        set.insert("zeta", 1);
        set.insert("alpha", 2);
        let names: Vec<_> = set.names().into_iter().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(set.generation("alpha"), Some(2));
    }
}
