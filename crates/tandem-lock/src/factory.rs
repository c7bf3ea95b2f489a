//! Lock set construction.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tandem_common::config::LockConfig;
use tandem_common::types::ResourceId;
use tracing::trace;

use crate::set::LockSet;
use crate::stats::LockStats;

/// Creates lock sets that share one configuration and one set of
/// statistics.
#[derive(Debug)]
pub struct LockSetFactory {
    next_anonymous: AtomicU64,
    config: Arc<LockConfig>,
    stats: Arc<LockStats>,
}

impl LockSetFactory {
    /// Creates a factory.
    pub fn new(config: Arc<LockConfig>, stats: Arc<LockStats>) -> Self {
        Self {
            next_anonymous: AtomicU64::new(1),
            config,
            stats,
        }
    }

    /// Creates a lock set for a fresh anonymous resource.
    pub fn create(&self) -> Arc<LockSet> {
        let id = self.next_anonymous.fetch_add(1, AtomicOrdering::Relaxed);
        self.create_with_id(ResourceId::anonymous(id))
    }

    /// Creates a lock set for `id`.
    ///
    /// The factory does not deduplicate: two calls with the same ID give
    /// two independent lock sets.
    pub fn create_with_id(&self, id: ResourceId) -> Arc<LockSet> {
        trace!(resource = %id, "lock set created");
        LockSet::new(id, Arc::clone(&self.config), Arc::clone(&self.stats))
    }

    /// Creates a lock set for `id` registered as a subordinate of
    /// `related`, so that it is cascaded whenever `related` drops an
    /// owner's locks.
    pub fn create_related(&self, id: ResourceId, related: &Arc<LockSet>) -> Arc<LockSet> {
        let set = self.create_with_id(id);
        related.add_subordinate(&set);
        set
    }

    /// Returns the configuration given to new lock sets.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> LockSetFactory {
        LockSetFactory::new(
            Arc::new(LockConfig::for_testing()),
            Arc::new(LockStats::default()),
        )
    }

    #[test]
    fn test_anonymous_ids_are_distinct() {
        let factory = factory();
        let a = factory.create();
        let b = factory.create();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), &ResourceId::anonymous(1));
    }

    #[test]
    fn test_create_related_registers_subordinate() {
        let factory = factory();
        let table = factory.create_with_id(ResourceId::table(9));
        let row = factory.create_related(ResourceId::row(9, "r1"), &table);

        let subs = table.subordinates();
        assert_eq!(subs.len(), 1);
        assert!(Arc::ptr_eq(&subs[0], &row));
        assert!(row.subordinates().is_empty());

        drop(subs);
        drop(row);
        assert!(table.subordinates().is_empty());
    }
}
