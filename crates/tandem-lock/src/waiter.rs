//! Wait-queue nodes for blocked lock requests.
//!
//! A [`BlockedOwner`] is created when a timed request conflicts. It is
//! pushed onto the lock set's FIFO queue while the lock set mutex is held,
//! and only then does the requesting thread sleep on the node's own
//! condition variable. Anyone who wants the sleeper to act (a releasing
//! owner, an abort signal) changes the node's slot under the node mutex
//! and notifies, so a wakeup can never fall between enqueueing and
//! sleeping.

use std::fmt;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::mode::LockMode;
use crate::owner::OwnerRef;

/// External signal that ends a wait without a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSignal {
    /// The waiting thread was interrupted.
    Interrupted,
    /// The owner was aborted.
    Aborted,
    /// The owner was chosen as a deadlock victim.
    DeadlockDetected,
}

/// What a sleeping waiter found when it woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// A lock was released; retry the grant.
    Alerted,
    /// The deadline passed with nothing happening.
    TimedOut,
    /// An external signal ended the wait.
    Signalled(WakeSignal),
}

#[derive(Debug, Default)]
struct Slot {
    alerted: bool,
    signal: Option<WakeSignal>,
}

/// One owner blocked on one lock set.
pub struct BlockedOwner {
    owner: OwnerRef,
    mode: LockMode,
    since: Instant,
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl BlockedOwner {
    pub(crate) fn new(owner: OwnerRef, mode: LockMode) -> Self {
        Self {
            owner,
            mode,
            since: Instant::now(),
            slot: Mutex::new(Slot::default()),
            cond: Condvar::new(),
        }
    }

    /// Returns the blocked owner.
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Returns the requested mode.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Returns when the owner started waiting.
    pub fn since(&self) -> Instant {
        self.since
    }

    /// Asks the waiter to retry its grant.
    pub(crate) fn alert(&self) {
        let mut slot = self.slot.lock();
        if !slot.alerted {
            slot.alerted = true;
            self.cond.notify_one();
        }
    }

    /// Ends the wait with an external signal. The first signal wins.
    pub(crate) fn signal(&self, signal: WakeSignal) {
        let mut slot = self.slot.lock();
        if slot.signal.is_none() {
            slot.signal = Some(signal);
            self.cond.notify_one();
        }
    }

    /// Clears a consumed alert before going back to sleep.
    pub(crate) fn rearm(&self) {
        self.slot.lock().alerted = false;
    }

    /// Returns true if an alert is pending.
    pub(crate) fn is_alerted(&self) -> bool {
        self.slot.lock().alerted
    }

    /// Sleeps until alerted, signalled, or `deadline` passes. Without a
    /// deadline only an alert or a signal ends the sleep.
    ///
    /// A signal takes precedence over a pending alert.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> Wakeup {
        let mut slot = self.slot.lock();
        loop {
            if let Some(signal) = slot.signal {
                return Wakeup::Signalled(signal);
            }
            if slot.alerted {
                return Wakeup::Alerted;
            }
            let Some(deadline) = deadline else {
                self.cond.wait(&mut slot);
                continue;
            };
            if self.cond.wait_until(&mut slot, deadline).timed_out() {
                return match (slot.signal, slot.alerted) {
                    (Some(signal), _) => Wakeup::Signalled(signal),
                    (None, true) => Wakeup::Alerted,
                    (None, false) => Wakeup::TimedOut,
                };
            }
        }
    }
}

impl fmt::Debug for BlockedOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockedOwner")
            .field("owner", &self.owner.id())
            .field("mode", &self.mode)
            .field("waited", &self.since.elapsed())
            .finish()
    }
}
