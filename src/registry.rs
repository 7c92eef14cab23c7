// Registry of all defined filters
//
// DESIGN: One RwLock guards both the map and the id counter, so allocating
// an id and inserting the filter is a single critical section. Filters are
// built before the lock is taken and published whole, readers never see a
// partially constructed filter.

use crate::filter::{Filter, FilterId, MatchStrategy, create_filter};
use crate::normalize::term_tokens;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Inner {
    filters: BTreeMap<FilterId, Arc<dyn Filter>>,
    next_id: FilterId,
}

/// Owns every registered filter and hands out identifiers.
///
/// Identifiers start at 1, increase by one per registration and are never
/// reused. There is no update or delete.
pub struct FilterRegistry {
    strategy: MatchStrategy,
    inner: RwLock<Inner>,
}

impl FilterRegistry {
    /// Create an empty registry whose `register` builds filters of `strategy`
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            inner: RwLock::new(Inner {
                filters: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Normalize `definition`, assign the next identifier and store the filter.
    pub fn register(&self, definition: &str) -> Arc<dyn Filter> {
        self.register_with(definition, self.strategy)
    }

    /// Same as [`register`](Self::register) with an explicit strategy.
    pub fn register_with(&self, definition: &str, strategy: MatchStrategy) -> Arc<dyn Filter> {
        let terms = term_tokens(definition);

        let filter = {
            let mut inner = self.inner.write();
            let id = inner.next_id;
            inner.next_id += 1;

            let filter = create_filter(strategy, id, terms);
            inner.filters.insert(id, Arc::clone(&filter));
            filter
        };

        tracing::debug!(
            fid = filter.id(),
            strategy = %strategy,
            terms = %filter.display_terms(),
            "Registered filter"
        );
        filter
    }

    /// Consistent view of all registered filters, ascending by identifier.
    ///
    /// Registrations that complete after the snapshot is taken are not
    /// included; each filter appears at most once.
    pub fn snapshot(&self) -> Vec<Arc<dyn Filter>> {
        self.inner.read().filters.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new(MatchStrategy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_sequential_ids() {
        let registry = FilterRegistry::default();
        assert!(registry.is_empty());

        let ids: Vec<FilterId> = ["a", "b", "c", "d"]
            .iter()
            .map(|d| registry.register(d).id())
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_register_normalizes_terms() {
        let registry = FilterRegistry::default();
        let filter = registry.register("  Hello   WORLD ");
        assert_eq!(filter.terms(), ["hello", "world"]);
        assert_eq!(filter.display_terms(), "hello world");
    }

    #[test]
    fn test_empty_definition_still_gets_an_id() {
        let registry = FilterRegistry::default();
        let first = registry.register("");
        let second = registry.register("x");
        assert_eq!(first.id(), 1);
        assert_eq!(first.display_terms(), "");
        assert_eq!(second.id(), 2);
    }

    #[test]
    fn test_keys_match_filter_ids() {
        let registry = FilterRegistry::default();
        for definition in ["one", "two", "three"] {
            registry.register(definition);
        }

        let ids: Vec<FilterId> = registry.snapshot().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = FilterRegistry::default();
        registry.register("a");
        let snapshot = registry.snapshot();

        registry.register("b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_register_with_strategy() {
        let registry = FilterRegistry::new(MatchStrategy::All);
        let filter = registry.register_with("x", MatchStrategy::All);
        assert_eq!(filter.strategy(), MatchStrategy::All);
        assert_eq!(registry.strategy(), MatchStrategy::All);
    }

    #[test]
    fn test_concurrent_registration_ids_unique_and_dense() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let registry = FilterRegistry::default();

        let ids: Vec<FilterId> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let registry = &registry;
                    scope.spawn(move || {
                        (0..PER_THREAD)
                            .map(|i| registry.register(&format!("t{t} n{i}")).id())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let total = (THREADS * PER_THREAD) as FilterId;
        let unique: HashSet<FilterId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(unique, (1..=total).collect::<HashSet<_>>());
        assert_eq!(registry.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_registered_filter_visible_to_later_snapshot() {
        let registry = FilterRegistry::default();

        thread::scope(|scope| {
            let id = scope.spawn(|| registry.register("late").id()).join().unwrap();
            let snapshot = registry.snapshot();
            assert!(snapshot.iter().any(|f| f.id() == id));
        });
    }
}
