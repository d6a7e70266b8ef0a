//! In-memory topic set shared between the refresh routine and the consumer

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    topics: BTreeSet<String>,
    version: u64,
}

/// Current set of known topic names
///
/// Only whole-set operations are exposed: readers get a copy, writers swap
/// the set in one step. The lock is held for the copy or the swap only.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    inner: Mutex<Inner>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with `topics`
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        registry.replace(topics);
        registry
    }

    // A panic while holding the lock cannot leave a half-written set behind,
    // since the set is only ever assigned whole.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current topic set, sorted by name
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().topics.iter().cloned().collect()
    }

    /// Atomically replace the topic set
    ///
    /// Returns `true` when the new set differs from the old one; the version
    /// is bumped only in that case.
    pub fn replace<I, S>(&self, topics: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: BTreeSet<String> = topics.into_iter().map(Into::into).collect();

        let mut inner = self.lock();
        if inner.topics == topics {
            return false;
        }
        inner.topics = topics;
        inner.version += 1;
        true
    }

    /// Number of changes applied so far
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Number of topics in the current set
    pub fn len(&self) -> usize {
        self.lock().topics.len()
    }

    /// Whether the current set is empty
    pub fn is_empty(&self) -> bool {
        self.lock().topics.is_empty()
    }

    /// Whether `topic` is in the current set
    pub fn contains(&self, topic: &str) -> bool {
        self.lock().topics.contains(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_registry() {
        let registry = TopicRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.version(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_replace_swaps_whole_set() {
        let registry = TopicRegistry::with_topics(["orders", "payments"]);
        assert_eq!(registry.snapshot(), vec!["orders", "payments"]);

        assert!(registry.replace(["shipments"]));
        assert_eq!(registry.snapshot(), vec!["shipments"]);
        assert!(!registry.contains("orders"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_deduplicates_and_sorts() {
        let registry = TopicRegistry::new();
        registry.replace(["payments", "orders", "payments"]);
        assert_eq!(registry.snapshot(), vec!["orders", "payments"]);
    }

    #[test]
    fn test_version_only_moves_on_change() {
        let registry = TopicRegistry::with_topics(["orders"]);
        assert_eq!(registry.version(), 1);

        assert!(!registry.replace(["orders"]));
        assert_eq!(registry.version(), 1);

        assert!(registry.replace(["orders", "payments"]));
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_sets() {
        let set_a: Vec<String> = (0..50).map(|i| format!("a-{:02}", i)).collect();
        let set_b: Vec<String> = (0..50).map(|i| format!("b-{:02}", i)).collect();
        let registry = Arc::new(TopicRegistry::with_topics(set_a.clone()));

        let writer = {
            let registry = Arc::clone(&registry);
            let (set_a, set_b) = (set_a.clone(), set_b.clone());
            thread::spawn(move || {
                for i in 0..200 {
                    if i % 2 == 0 {
                        registry.replace(set_b.clone());
                    } else {
                        registry.replace(set_a.clone());
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let (set_a, set_b) = (set_a.clone(), set_b.clone());
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = registry.snapshot();
                        assert!(snapshot == set_a || snapshot == set_b);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
