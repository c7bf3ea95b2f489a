//! Lock coordinators.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::owner::OwnerRef;
use crate::set::LockSet;

/// Capability to drop one owner's locks on one lock set.
///
/// Handed to transaction completion logic, which calls
/// [`drop_locks`](Self::drop_locks) at commit or rollback without needing
/// access to the lock set itself.
#[derive(Clone)]
pub struct LockCoordinator {
    lock_set: Arc<LockSet>,
    owner: OwnerRef,
}

impl LockCoordinator {
    pub(crate) fn new(lock_set: Arc<LockSet>, owner: OwnerRef) -> Self {
        Self { lock_set, owner }
    }

    /// Drops every lock the owner and its descendants hold on the lock set
    /// and its subordinates.
    pub fn drop_locks(&self) {
        debug!(resource = %self.lock_set.id(), owner = %self.owner.id(), "coordinator dropping locks");
        self.lock_set.drop_owner(&self.owner);
    }

    /// Returns the bound lock set.
    pub fn lock_set(&self) -> &Arc<LockSet> {
        &self.lock_set
    }

    /// Returns the bound owner.
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("resource", self.lock_set.id())
            .field("owner", &self.owner.id())
            .finish()
    }
}
