//! Per-mode grant chains.
//!
//! Each lock set keeps one [`ModeChain`] per lock mode. A chain holds at
//! most one [`Lock`] record per owner. Descendants that share an
//! ancestor's grant are recorded as sharers on the ancestor's record
//! rather than as records of their own.

use std::sync::Arc;

use tandem_common::types::OwnerId;

use crate::owner::{LockOwner, OwnerRef};

/// A descendant sharing an ancestor's grant.
#[derive(Debug, Clone)]
pub(crate) struct Sharer {
    pub(crate) owner: OwnerRef,
    pub(crate) count: u32,
}

/// A grant record: one owner holding one mode on one lock set.
#[derive(Debug, Clone)]
pub(crate) struct Lock {
    pub(crate) owner: OwnerRef,
    pub(crate) count: u32,
    pub(crate) sharers: Vec<Sharer>,
}

impl Lock {
    pub(crate) fn new(owner: OwnerRef) -> Self {
        Self {
            owner,
            count: 1,
            sharers: Vec::new(),
        }
    }

    fn from_sharer(sharer: Sharer) -> Self {
        Self {
            owner: sharer.owner,
            count: sharer.count,
            sharers: Vec::new(),
        }
    }

    /// Returns true if neither `requester` nor any of its ancestors is
    /// this holder.
    fn blocks(holder: &LockOwner, requester: &LockOwner) -> bool {
        holder.id() != requester.id() && !holder.is_parent_of(requester)
    }
}

/// Where a caller's hold on a mode is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hold {
    /// The caller's own record, by index.
    Own(usize),
    /// A sharer entry on another owner's record.
    Shared { lock: usize, sharer: usize },
}

/// Grant records for one lock mode.
#[derive(Debug, Default)]
pub(crate) struct ModeChain {
    pub(crate) locks: Vec<Lock>,
}

impl ModeChain {
    pub(crate) fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Finds the caller's hold on this mode.
    pub(crate) fn find(&self, owner: OwnerId) -> Option<Hold> {
        if let Some(idx) = self.locks.iter().position(|l| l.owner.id() == owner) {
            return Some(Hold::Own(idx));
        }
        self.locks.iter().enumerate().find_map(|(lock, l)| {
            l.sharers
                .iter()
                .position(|s| s.owner.id() == owner)
                .map(|sharer| Hold::Shared { lock, sharer })
        })
    }

    /// Increments the count of an existing hold.
    pub(crate) fn reenter(&mut self, hold: Hold) {
        match hold {
            Hold::Own(idx) => self.locks[idx].count += 1,
            Hold::Shared { lock, sharer } => self.locks[lock].sharers[sharer].count += 1,
        }
    }

    /// Finds a record owned by an ancestor of `owner`.
    pub(crate) fn ancestor_lock(&self, owner: &LockOwner) -> Option<usize> {
        self.locks.iter().position(|l| l.owner.is_parent_of(owner))
    }

    /// Returns the first holder that blocks `requester`, if any.
    ///
    /// Sharers count as holders.
    pub(crate) fn conflicting_holder(&self, requester: &LockOwner) -> Option<OwnerId> {
        for lock in &self.locks {
            if Lock::blocks(&lock.owner, requester) {
                return Some(lock.owner.id());
            }
            if let Some(sharer) = lock
                .sharers
                .iter()
                .find(|s| Lock::blocks(&s.owner, requester))
            {
                return Some(sharer.owner.id());
            }
        }
        None
    }

    /// Decrements a hold. Returns the owner whose entry disappeared, if
    /// the count reached zero.
    ///
    /// When a record's own count reaches zero its sharers are promoted to
    /// records of their own.
    pub(crate) fn release(&mut self, hold: Hold) -> Option<OwnerRef> {
        match hold {
            Hold::Own(idx) => {
                let lock = &mut self.locks[idx];
                lock.count -= 1;
                if lock.count > 0 {
                    return None;
                }
                let lock = self.locks.remove(idx);
                self.locks
                    .extend(lock.sharers.into_iter().map(Lock::from_sharer));
                Some(lock.owner)
            }
            Hold::Shared { lock, sharer } => {
                let sharers = &mut self.locks[lock].sharers;
                sharers[sharer].count -= 1;
                if sharers[sharer].count > 0 {
                    return None;
                }
                Some(sharers.remove(sharer).owner)
            }
        }
    }

    /// Removes every record and sharer entry held by `owner` or one of its
    /// descendants. Returns the owners whose entries were removed.
    pub(crate) fn remove_family(&mut self, owner: &LockOwner) -> Vec<OwnerRef> {
        let in_family = |o: &OwnerRef| o.id() == owner.id() || owner.is_parent_of(o);
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.locks.len());

        for mut lock in self.locks.drain(..) {
            let (gone, stay): (Vec<Sharer>, Vec<Sharer>) =
                lock.sharers.drain(..).partition(|s| in_family(&s.owner));
            removed.extend(gone.into_iter().map(|s| s.owner));

            if in_family(&lock.owner) {
                removed.push(Arc::clone(&lock.owner));
                kept.extend(stay.into_iter().map(Lock::from_sharer));
            } else {
                lock.sharers = stay;
                kept.push(lock);
            }
        }

        self.locks = kept;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::LockManager;

    #[test]
    fn test_find_and_reenter() {
        let manager = LockManager::new();
        let a = manager.begin_transaction(None);
        let mut chain = ModeChain::default();
        chain.locks.push(Lock::new(Arc::clone(&a)));

        let hold = chain.find(a.id()).unwrap();
        assert_eq!(hold, Hold::Own(0));
        chain.reenter(hold);
        assert_eq!(chain.locks[0].count, 2);

        assert!(chain.release(hold).is_none());
        assert_eq!(chain.release(hold).unwrap().id(), a.id());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_sharer_promoted_on_release() {
        let manager = LockManager::new();
        let parent = manager.begin_transaction(None);
        let child = manager.begin_nested(&parent, None);

        let mut chain = ModeChain::default();
        chain.locks.push(Lock::new(Arc::clone(&parent)));
        assert_eq!(chain.ancestor_lock(&child), Some(0));
        chain.locks[0].sharers.push(Sharer {
            owner: Arc::clone(&child),
            count: 2,
        });
        assert_eq!(chain.find(child.id()), Some(Hold::Shared { lock: 0, sharer: 0 }));

        chain.release(Hold::Own(0));
        assert_eq!(chain.locks.len(), 1);
        assert_eq!(chain.locks[0].owner.id(), child.id());
        assert_eq!(chain.locks[0].count, 2);
    }

    #[test]
    fn test_conflicting_holder_sees_sharers() {
        let manager = LockManager::new();
        let parent = manager.begin_transaction(None);
        let left = manager.begin_nested(&parent, None);
        let right = manager.begin_nested(&parent, None);

        let mut chain = ModeChain::default();
        chain.locks.push(Lock::new(Arc::clone(&parent)));
        assert_eq!(chain.conflicting_holder(&left), None);

        chain.locks[0].sharers.push(Sharer {
            owner: Arc::clone(&left),
            count: 1,
        });
        assert_eq!(chain.conflicting_holder(&right), Some(left.id()));
        assert_eq!(chain.conflicting_holder(&left), None);
    }

    #[test]
    fn test_remove_family() {
        let manager = LockManager::new();
        let parent = manager.begin_transaction(None);
        let child = manager.begin_nested(&parent, None);
        let stranger = manager.begin_transaction(None);

        let mut chain = ModeChain::default();
        chain.locks.push(Lock::new(Arc::clone(&parent)));
        chain.locks.push(Lock::new(Arc::clone(&stranger)));
        chain.locks[0].sharers.push(Sharer {
            owner: Arc::clone(&child),
            count: 1,
        });

        let removed = chain.remove_family(&parent);
        let mut ids: Vec<_> = removed.iter().map(|o| o.id()).collect();
        ids.sort();
        assert_eq!(ids, vec![parent.id(), child.id()]);
        assert_eq!(chain.locks.len(), 1);
        assert_eq!(chain.locks[0].owner.id(), stranger.id());
    }
}
