//! Registry of live lock owners.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tandem_common::types::OwnerId;

use super::{LockOwner, OwnerRef};

/// Enumerable set of the live owners of one lock manager.
///
/// Guarded by its own mutex, never taken while a lock set mutex is held.
#[derive(Debug, Default)]
pub struct OwnerRegistry {
    owners: Mutex<HashMap<OwnerId, Weak<LockOwner>>>,
}

impl OwnerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, owner: &OwnerRef) {
        self.owners.lock().insert(owner.id(), Arc::downgrade(owner));
    }

    pub(crate) fn deregister(&self, id: OwnerId) {
        self.owners.lock().remove(&id);
    }

    /// Looks up a live owner by ID.
    pub fn get(&self, id: OwnerId) -> Option<OwnerRef> {
        self.owners.lock().get(&id).and_then(Weak::upgrade)
    }

    /// Returns every live owner, ordered by ID.
    ///
    /// Owners dropped without being discarded are pruned here.
    pub fn owners(&self) -> Vec<OwnerRef> {
        let mut owners = self.owners.lock();
        owners.retain(|_, owner| owner.strong_count() > 0);
        let mut live: Vec<OwnerRef> = owners.values().filter_map(Weak::upgrade).collect();
        live.sort_by_key(|owner| owner.id());
        live
    }

    /// Returns the number of registered owners.
    pub fn len(&self) -> usize {
        self.owners.lock().len()
    }

    /// Returns true if no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
