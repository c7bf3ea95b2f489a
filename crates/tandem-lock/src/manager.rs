//! Lock manager state.
//!
//! [`LockManager`] owns everything that would otherwise be process-wide:
//! the owner registry, the owner ID generator, the per-thread owners, and
//! the factory (with its configuration and statistics) that lock sets are
//! built from. Collaborators that need to find "the owner of the current
//! context" go through the [`OwnerResolver`] trait.
//!
//! A thread owner lives until its thread exits: a thread-local guard
//! discards it then, releasing whatever it still holds.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use bytes::Bytes;
use parking_lot::Mutex;
use tandem_common::config::LockConfig;
use tandem_common::error::TandemResult;
use tandem_common::types::OwnerId;
use tracing::debug;

use crate::factory::LockSetFactory;
use crate::owner::{LockOwner, OwnerRef, OwnerRegistry};
use crate::stats::{LockStats, LockStatsSnapshot};

/// Resolves the lock owner of the calling context.
pub trait OwnerResolver: Send + Sync {
    /// Returns the owner locks should be taken for right now.
    fn current_owner(&self) -> OwnerRef;
}

/// Thread owners of one manager, keyed by thread.
#[derive(Default)]
struct ThreadOwners {
    owners: Mutex<HashMap<ThreadId, OwnerRef>>,
}

impl ThreadOwners {
    /// Removes and discards the owner of `thread`.
    fn release(&self, thread: ThreadId) -> bool {
        let owner = self.owners.lock().remove(&thread);
        match owner {
            Some(owner) => {
                owner.discard();
                true
            }
            None => false,
        }
    }
}

/// Releases the exiting thread's owners in every manager it used.
struct ThreadExit {
    thread: ThreadId,
    managers: Vec<Weak<ThreadOwners>>,
}

impl ThreadExit {
    fn watch(&mut self, owners: &Arc<ThreadOwners>) {
        self.managers.retain(|m| m.strong_count() > 0);
        if !self.managers.iter().any(|m| std::ptr::eq(m.as_ptr(), Arc::as_ptr(owners))) {
            self.managers.push(Arc::downgrade(owners));
        }
    }
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for owners in self.managers.drain(..) {
            if let Some(owners) = owners.upgrade() {
                if owners.release(self.thread) {
                    debug!(thread = ?self.thread, "thread owner released on exit");
                }
            }
        }
    }
}

thread_local! {
    static THREAD_EXIT: RefCell<Option<ThreadExit>> = const { RefCell::new(None) };
}

/// Owner registry, owner factory and lock set factory in one place.
pub struct LockManager {
    config: Arc<LockConfig>,
    registry: Arc<OwnerRegistry>,
    factory: LockSetFactory,
    stats: Arc<LockStats>,
    next_owner: AtomicU64,
    thread_owners: Arc<ThreadOwners>,
}

impl LockManager {
    /// Creates a lock manager with the default configuration.
    pub fn new() -> Self {
        Self::build(LockConfig::default())
    }

    /// Creates a lock manager with a validated configuration.
    pub fn with_config(config: LockConfig) -> TandemResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LockConfig) -> Self {
        let config = Arc::new(config);
        let stats = Arc::new(LockStats::new(config.collect_stats));
        Self {
            factory: LockSetFactory::new(Arc::clone(&config), Arc::clone(&stats)),
            config,
            registry: Arc::new(OwnerRegistry::new()),
            stats,
            next_owner: AtomicU64::new(OwnerId::MIN.as_u64()),
            thread_owners: Arc::new(ThreadOwners::default()),
        }
    }

    fn next_owner_id(&self) -> OwnerId {
        OwnerId::new(self.next_owner.fetch_add(1, AtomicOrdering::Relaxed))
    }

    fn register(&self, owner: LockOwner) -> OwnerRef {
        let owner = Arc::new(owner);
        self.registry.register(&owner);
        owner
    }

    /// Returns the thread owner of the calling thread.
    ///
    /// Created on first use. Once that owner has started shrinking, the
    /// next call discards it and creates a fresh one. The owner is
    /// discarded when the thread exits.
    pub fn thread_owner(&self) -> OwnerRef {
        let thread = std::thread::current().id();
        let (owner, replaced) = {
            let mut owners = self.thread_owners.owners.lock();
            if let Some(owner) = owners.get(&thread) {
                if owner.is_growing() {
                    return Arc::clone(owner);
                }
            }
            let owner = self.register(LockOwner::thread(
                self.next_owner_id(),
                Arc::downgrade(&self.registry),
            ));
            debug!(owner = %owner.id(), "thread owner created");
            (Arc::clone(&owner), owners.insert(thread, owner))
        };
        if let Some(replaced) = replaced {
            replaced.discard();
        }
        // Not available while the thread is already tearing down.
        let _ = THREAD_EXIT.try_with(|exit| {
            exit.borrow_mut()
                .get_or_insert_with(|| ThreadExit {
                    thread,
                    managers: Vec::new(),
                })
                .watch(&self.thread_owners);
        });
        owner
    }

    /// Discards the calling thread's owner, releasing its locks.
    ///
    /// Returns false if the thread had no owner.
    pub fn release_thread_owner(&self) -> bool {
        self.thread_owners.release(std::thread::current().id())
    }

    /// Begins a top-level transaction owner.
    pub fn begin_transaction(&self, identifier: Option<Bytes>) -> OwnerRef {
        let owner = self.register(LockOwner::transaction(
            self.next_owner_id(),
            identifier,
            None,
            Arc::downgrade(&self.registry),
        ));
        debug!(owner = %owner.id(), "transaction owner created");
        owner
    }

    /// Begins a transaction owner nested in `parent`.
    ///
    /// Nesting under a thread owner is allowed, but since threads have no
    /// descendants the new owner shares none of the thread's locks.
    pub fn begin_nested(&self, parent: &OwnerRef, identifier: Option<Bytes>) -> OwnerRef {
        let owner = self.register(LockOwner::transaction(
            self.next_owner_id(),
            identifier,
            Some(Arc::clone(parent)),
            Arc::downgrade(&self.registry),
        ));
        debug!(owner = %owner.id(), parent = %parent.id(), "nested owner created");
        owner
    }

    /// Returns the owner registry.
    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    /// Returns every live owner, ordered by ID.
    pub fn owners(&self) -> Vec<OwnerRef> {
        self.registry.owners()
    }

    /// Returns the number of registered owners.
    pub fn owner_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the lock set factory.
    pub fn factory(&self) -> &LockSetFactory {
        &self.factory
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Returns a snapshot of the lock statistics.
    pub fn stats(&self) -> LockStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerResolver for LockManager {
    fn current_owner(&self) -> OwnerRef {
        self.thread_owner()
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.config)
            .field("owners", &self.registry.len())
            .finish_non_exhaustive()
    }
}
