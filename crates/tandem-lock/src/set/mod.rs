//! Lock sets.
//!
//! A [`LockSet`] protects one resource. It keeps a grant chain per lock
//! mode, a FIFO queue of blocked owners, and weak links to subordinate
//! lock sets whose locks must be dropped whenever this set drops an
//! owner's locks.
//!
//! # Acquisition
//!
//! 1. If the caller already holds the mode (as a record of its own or as a
//!    sharer of an ancestor's record) its count is incremented.
//! 2. Otherwise every chain whose mode conflicts with the request is
//!    scanned. Holders that are neither the caller nor one of its
//!    ancestors block the request.
//! 3. Without a conflict, the caller shares an ancestor's record for the
//!    same mode if one exists, or gets a fresh record.
//!
//! A blocked request waits on its own [`BlockedOwner`] node. Releases alert
//! the head of the queue; a woken waiter that still conflicts passes the
//! alert to the waiter behind it.
//!
//! # Locking Discipline
//!
//! The lock set mutex is taken before an owner's state mutex, never the
//! other way around, and no two lock set mutexes are held at once.

mod chain;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tandem_common::config::LockConfig;
use tandem_common::types::{OwnerId, ResourceId};
use tracing::{debug, trace};

use crate::coordinator::LockCoordinator;
use crate::error::{GrantFailure, LockError, LockResult};
use crate::mode::LockMode;
use crate::owner::{LockOwner, OwnerRef};
use crate::stats::LockStats;
use crate::waiter::{BlockedOwner, WakeSignal, Wakeup};

use self::chain::{Lock, ModeChain, Sharer};

/// How a request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Reentered,
    Shared,
    Created,
}

/// How long a request may wait for conflicting locks to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// Fail at once on conflict.
    Never,
    /// Wait until the deadline.
    Until(Instant),
    /// The timeout does not fit in an `Instant`; wait without a deadline.
    Forever,
}

impl Wait {
    fn after(timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Wait::Never;
        }
        Instant::now()
            .checked_add(timeout)
            .map_or(Wait::Forever, Wait::Until)
    }
}

/// Snapshot of one grant record, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Granted mode.
    pub mode: LockMode,
    /// Owner of the record.
    pub owner: OwnerId,
    /// Re-entry count of the owner.
    pub count: u32,
    /// Descendants sharing the record, with their counts.
    pub sharers: Vec<(OwnerId, u32)>,
}

#[derive(Default)]
struct LockSetInner {
    chains: [ModeChain; LockMode::COUNT],
    queue: VecDeque<Arc<BlockedOwner>>,
    subordinates: Vec<Weak<LockSet>>,
}

impl LockSetInner {
    fn chain(&self, mode: LockMode) -> &ModeChain {
        &self.chains[mode.ordinal()]
    }

    fn chain_mut(&mut self, mode: LockMode) -> &mut ModeChain {
        &mut self.chains[mode.ordinal()]
    }

    fn alert_head(&self) {
        if let Some(head) = self.queue.front() {
            head.alert();
        }
    }

    /// Alerts the waiter queued right behind `waiter`.
    fn alert_behind(&self, waiter: &Arc<BlockedOwner>) {
        if let Some(pos) = self.queue.iter().position(|w| Arc::ptr_eq(w, waiter)) {
            if let Some(next) = self.queue.get(pos + 1) {
                next.alert();
            }
        }
    }

    fn leave_queue(&mut self, waiter: &Arc<BlockedOwner>) {
        self.queue.retain(|w| !Arc::ptr_eq(w, waiter));
    }
}

/// The locks held on one protected resource.
pub struct LockSet {
    id: ResourceId,
    me: Weak<LockSet>,
    inner: Mutex<LockSetInner>,
    config: Arc<LockConfig>,
    stats: Arc<LockStats>,
}

impl LockSet {
    /// Creates a standalone lock set.
    pub fn new(id: ResourceId, config: Arc<LockConfig>, stats: Arc<LockStats>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            me: me.clone(),
            inner: Mutex::new(LockSetInner::default()),
            config,
            stats,
        })
    }

    /// Returns the protected resource.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Acquires `mode` for `owner` without waiting.
    ///
    /// Fails with [`GrantFailure::Conflict`] if a conflicting lock is held.
    pub fn lock(&self, owner: &OwnerRef, mode: LockMode) -> LockResult<()> {
        self.acquire(owner, mode, Wait::Never)
    }

    /// Acquires `mode` for `owner`, waiting up to `timeout` for
    /// conflicting locks to go away.
    ///
    /// A zero timeout does not wait. A timeout too large to represent as
    /// a deadline waits until granted or signalled.
    pub fn lock_timeout(&self, owner: &OwnerRef, mode: LockMode, timeout: Duration) -> LockResult<()> {
        self.acquire(owner, mode, Wait::after(timeout))
    }

    /// Acquires `mode` for `owner`, waiting up to the configured default
    /// timeout.
    pub fn lock_wait(&self, owner: &OwnerRef, mode: LockMode) -> LockResult<()> {
        self.lock_timeout(owner, mode, self.config.default_timeout)
    }

    /// Tries to acquire `mode` without waiting.
    ///
    /// Returns `Ok(false)` on conflict. A shrinking owner still gets
    /// [`GrantFailure::OwnerShrinking`] as an error.
    pub fn try_lock(&self, owner: &OwnerRef, mode: LockMode) -> LockResult<bool> {
        match self.acquire(owner, mode, Wait::Never) {
            Ok(()) => Ok(true),
            Err(err) if err.is_retryable() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Releases one count of `mode` held by `owner`.
    pub fn unlock(&self, owner: &OwnerRef, mode: LockMode) -> LockResult<()> {
        let mut inner = self.inner.lock();
        let hold = inner
            .chain(mode)
            .find(owner.id())
            .ok_or_else(|| self.not_held(owner, mode))?;

        if let Some(gone) = inner.chain_mut(mode).release(hold) {
            gone.unlink(&self.me, mode);
            self.stats.record_release();
            trace!(resource = %self.id, owner = %owner.id(), %mode, "released");
            inner.alert_head();
        }
        Ok(())
    }

    /// Changes a held mode to `new_mode` without waiting.
    pub fn change_mode(&self, owner: &OwnerRef, held: LockMode, new_mode: LockMode) -> LockResult<()> {
        self.change_mode_inner(owner, held, new_mode, Wait::Never)
    }

    /// Changes a held mode to `new_mode`, waiting up to `timeout`.
    ///
    /// The new mode is acquired before the old one is released; if the
    /// new mode cannot be granted the old one is still held.
    pub fn change_mode_timeout(
        &self,
        owner: &OwnerRef,
        held: LockMode,
        new_mode: LockMode,
        timeout: Duration,
    ) -> LockResult<()> {
        self.change_mode_inner(owner, held, new_mode, Wait::after(timeout))
    }

    fn change_mode_inner(
        &self,
        owner: &OwnerRef,
        held: LockMode,
        new_mode: LockMode,
        wait: Wait,
    ) -> LockResult<()> {
        if !self.holds(owner, held) {
            return Err(self.not_held(owner, held));
        }
        self.acquire(owner, new_mode, wait)?;
        self.unlock(owner, held)?;
        self.stats.record_mode_change();
        debug!(resource = %self.id, owner = %owner.id(), from = %held, to = %new_mode, "mode changed");
        Ok(())
    }

    /// Drops every lock held by `owner` or its descendants on this lock
    /// set and, recursively, on its subordinate lock sets.
    pub fn drop_owner(&self, owner: &LockOwner) {
        let subordinates = {
            let mut inner = self.inner.lock();
            let mut released = 0usize;
            for mode in LockMode::ALL {
                for gone in inner.chain_mut(mode).remove_family(owner) {
                    gone.unlink(&self.me, mode);
                    released += 1;
                }
            }
            inner.subordinates.retain(|s| s.strong_count() > 0);
            self.stats.record_drop();
            if released > 0 {
                debug!(resource = %self.id, owner = %owner.id(), released, "dropped owner locks");
            }
            inner
                .subordinates
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        };

        for subordinate in subordinates {
            subordinate.drop_owner(owner);
        }

        self.inner.lock().alert_head();
    }

    /// Returns a coordinator that drops `owner`'s locks on this lock set.
    pub fn coordinator(self: &Arc<Self>, owner: &OwnerRef) -> LockCoordinator {
        LockCoordinator::new(Arc::clone(self), Arc::clone(owner))
    }

    /// Registers `subordinate` so that it is cascaded whenever this lock
    /// set drops an owner's locks.
    pub fn add_subordinate(&self, subordinate: &Arc<LockSet>) {
        self.inner.lock().subordinates.push(Arc::downgrade(subordinate));
    }

    /// Returns the live subordinate lock sets.
    pub fn subordinates(&self) -> Vec<Arc<LockSet>> {
        self.inner
            .lock()
            .subordinates
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Returns true if `owner` holds `mode`, directly or as a sharer.
    pub fn holds(&self, owner: &LockOwner, mode: LockMode) -> bool {
        self.inner.lock().chain(mode).find(owner.id()).is_some()
    }

    /// Returns true if any lock is held.
    pub fn is_locked(&self) -> bool {
        self.inner.lock().chains.iter().any(|c| !c.is_empty())
    }

    /// Returns a snapshot of every grant record.
    pub fn holders(&self) -> Vec<LockInfo> {
        let guard = self.inner.lock();
        let inner: &LockSetInner = &guard;
        LockMode::ALL
            .iter()
            .flat_map(|&mode| {
                inner.chain(mode).locks.iter().map(move |lock| LockInfo {
                    mode,
                    owner: lock.owner.id(),
                    count: lock.count,
                    sharers: lock
                        .sharers
                        .iter()
                        .map(|s| (s.owner.id(), s.count))
                        .collect(),
                })
            })
            .collect()
    }

    /// Returns the owners waiting in the queue, head first.
    pub fn waiting(&self) -> Vec<(OwnerId, LockMode)> {
        self.inner
            .lock()
            .queue
            .iter()
            .map(|w| (w.owner().id(), w.mode()))
            .collect()
    }

    /// Returns the number of waiting requests.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Grants `mode` to `owner` if nothing conflicts.
    fn grant(&self, inner: &mut LockSetInner, owner: &OwnerRef, mode: LockMode) -> Result<Grant, GrantFailure> {
        if let Some(hold) = inner.chain(mode).find(owner.id()) {
            inner.chain_mut(mode).reenter(hold);
            return Ok(Grant::Reentered);
        }

        if !owner.is_growing() {
            return Err(GrantFailure::OwnerShrinking);
        }

        for &held in mode.conflicts() {
            if let Some(holder) = inner.chain(held).conflicting_holder(owner) {
                trace!(resource = %self.id, owner = %owner.id(), %mode, %holder, %held, "conflict");
                return Err(GrantFailure::Conflict);
            }
        }

        owner.link(self.me.clone(), &self.id, mode)?;

        let chain = inner.chain_mut(mode);
        match chain.ancestor_lock(owner) {
            Some(idx) => {
                chain.locks[idx].sharers.push(Sharer {
                    owner: Arc::clone(owner),
                    count: 1,
                });
                Ok(Grant::Shared)
            }
            None => {
                chain.locks.push(Lock::new(Arc::clone(owner)));
                Ok(Grant::Created)
            }
        }
    }

    fn record_grant(&self, owner: &LockOwner, mode: LockMode, grant: Grant) {
        match grant {
            Grant::Reentered => self.stats.record_reentry(),
            Grant::Shared => self.stats.record_shared_grant(),
            Grant::Created => self.stats.record_grant(),
        }
        trace!(resource = %self.id, owner = %owner.id(), %mode, ?grant, "granted");
    }

    fn acquire(&self, owner: &OwnerRef, mode: LockMode, wait: Wait) -> LockResult<()> {
        let (waiter, deadline) = {
            let mut inner = self.inner.lock();
            match self.grant(&mut inner, owner, mode) {
                Ok(grant) => {
                    self.record_grant(owner, mode, grant);
                    return Ok(());
                }
                Err(GrantFailure::Conflict) => {}
                Err(reason) => return Err(self.not_granted(owner, mode, reason)),
            }

            let deadline = match wait {
                Wait::Never => {
                    self.stats.record_conflict();
                    return Err(self.not_granted(owner, mode, GrantFailure::Conflict));
                }
                Wait::Until(deadline) => Some(deadline),
                Wait::Forever => None,
            };
            if self.config.is_queue_bounded() && inner.queue.len() >= self.config.max_wait_queue {
                self.stats.record_conflict();
                return Err(self.not_granted(owner, mode, GrantFailure::Conflict));
            }

            let waiter = Arc::new(BlockedOwner::new(Arc::clone(owner), mode));
            if let Err(reason) = owner.register_block(&waiter) {
                self.record_failure(reason);
                return Err(self.not_granted(owner, mode, reason));
            }
            inner.queue.push_back(Arc::clone(&waiter));
            (waiter, deadline)
        };

        self.stats.record_wait();
        debug!(resource = %self.id, owner = %owner.id(), %mode, "blocked");

        let result = self.wait_for_grant(&waiter, owner, mode, deadline);
        owner.unregister_block(&waiter);
        result
    }

    fn wait_for_grant(
        &self,
        waiter: &Arc<BlockedOwner>,
        owner: &OwnerRef,
        mode: LockMode,
        deadline: Option<Instant>,
    ) -> LockResult<()> {
        loop {
            let wakeup = waiter.wait_until(deadline);
            let mut inner = self.inner.lock();

            let reason = match wakeup {
                Wakeup::Alerted => match self.grant(&mut inner, owner, mode) {
                    Ok(grant) => {
                        inner.leave_queue(waiter);
                        inner.alert_head();
                        self.record_grant(owner, mode, grant);
                        debug!(resource = %self.id, owner = %owner.id(), %mode, "granted after wait");
                        return Ok(());
                    }
                    Err(GrantFailure::Conflict) if deadline.map_or(true, |d| Instant::now() < d) => {
                        waiter.rearm();
                        inner.alert_behind(waiter);
                        continue;
                    }
                    Err(GrantFailure::Conflict) => GrantFailure::Timeout,
                    Err(reason) => reason,
                },
                Wakeup::TimedOut => GrantFailure::Timeout,
                Wakeup::Signalled(WakeSignal::Interrupted) => GrantFailure::Interrupted,
                Wakeup::Signalled(WakeSignal::Aborted) => GrantFailure::Aborted,
                Wakeup::Signalled(WakeSignal::DeadlockDetected) => GrantFailure::DeadlockDetected,
            };

            // An alert that reached us is passed on so no wakeup is lost.
            let alerted = waiter.is_alerted();
            inner.leave_queue(waiter);
            if alerted {
                inner.alert_head();
            }
            drop(inner);

            self.record_failure(reason);
            debug!(resource = %self.id, owner = %owner.id(), %mode, %reason, "wait ended without grant");
            return Err(self.not_granted(owner, mode, reason));
        }
    }

    fn record_failure(&self, reason: GrantFailure) {
        match reason {
            GrantFailure::Timeout => self.stats.record_timeout(),
            GrantFailure::Interrupted => self.stats.record_interrupt(),
            GrantFailure::Aborted => self.stats.record_abort(),
            GrantFailure::DeadlockDetected => self.stats.record_deadlock(),
            GrantFailure::Conflict => self.stats.record_conflict(),
            GrantFailure::OwnerShrinking => {}
        }
    }

    fn not_granted(&self, owner: &LockOwner, mode: LockMode, reason: GrantFailure) -> LockError {
        LockError::NotGranted {
            resource: self.id.clone(),
            mode,
            owner: owner.id(),
            reason,
        }
    }

    fn not_held(&self, owner: &LockOwner, mode: LockMode) -> LockError {
        LockError::NotHeld {
            resource: self.id.clone(),
            mode,
            owner: owner.id(),
        }
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let held: usize = inner.chains.iter().map(|c| c.locks.len()).sum();
        f.debug_struct("LockSet")
            .field("id", &self.id)
            .field("held", &held)
            .field("waiting", &inner.queue.len())
            .field("subordinates", &inner.subordinates.len())
            .finish()
    }
}
