//! Lock owners.
//!
//! A lock owner is the identity on whose behalf locks are held: either a
//! plain thread running outside any transaction, or a transaction. Nested
//! transactions keep a link to their parent, which gives the ancestry
//! relation used by lock sets to let a descendant share its ancestors'
//! grants.
//!
//! # Phases
//!
//! ```text
//! ┌─────────┐   shrinking() / discard()   ┌───────────┐
//! │ Growing │────────────────────────────▶│ Shrinking │
//! └─────────┘                             └───────────┘
//! ```
//!
//! A growing owner may acquire and release individual locks. A shrinking
//! owner may not acquire new locks; its existing locks are dropped en
//! masse.

mod registry;

pub use registry::OwnerRegistry;

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use bytes::Bytes;
use parking_lot::Mutex;
use tandem_common::types::{OwnerId, ResourceId};
use tracing::debug;

use crate::error::{GrantFailure, LockError, LockResult};
use crate::mode::LockMode;
use crate::set::LockSet;
use crate::waiter::{BlockedOwner, WakeSignal};

/// Shared handle to a lock owner.
pub type OwnerRef = Arc<LockOwner>;

/// Two-phase locking phase of an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The owner may acquire and release locks.
    Growing,
    /// The owner may only drop its locks.
    Shrinking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Growing => write!(f, "Growing"),
            Phase::Shrinking => write!(f, "Shrinking"),
        }
    }
}

/// Owner backed by a thread with no transaction.
#[derive(Debug, Clone)]
pub struct ThreadOwner {
    thread: ThreadId,
    name: Option<String>,
}

impl ThreadOwner {
    /// Returns the thread's ID.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Returns the thread's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Owner backed by a (possibly nested) transaction.
#[derive(Debug, Clone)]
pub struct TransactionOwner {
    identifier: Option<Bytes>,
    parent: Option<OwnerRef>,
}

impl TransactionOwner {
    /// Returns the enclosing transaction, if nested.
    pub fn parent(&self) -> Option<&OwnerRef> {
        self.parent.as_ref()
    }
}

/// The concrete kind of a lock owner.
#[derive(Debug, Clone)]
pub enum OwnerKind {
    /// A thread outside any transaction.
    Thread(ThreadOwner),
    /// A transaction.
    Transaction(TransactionOwner),
}

/// The underlying handle an owner stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActualOwner {
    /// A thread.
    Thread(ThreadId),
    /// A transaction, by owner ID.
    Transaction(OwnerId),
}

/// One entry of an owner's held-lock list.
#[derive(Debug, Clone)]
pub(crate) struct HeldLock {
    lock_set: Weak<LockSet>,
    resource: ResourceId,
    mode: LockMode,
}

#[derive(Debug)]
struct OwnerState {
    phase: Phase,
    held: Vec<HeldLock>,
    blocks: Vec<Arc<BlockedOwner>>,
    signal: Option<WakeSignal>,
    interrupt_pending: bool,
}

/// A thread or transaction that holds locks.
pub struct LockOwner {
    id: OwnerId,
    kind: OwnerKind,
    state: Mutex<OwnerState>,
    registry: Weak<OwnerRegistry>,
}

impl LockOwner {
    fn new(id: OwnerId, kind: OwnerKind, registry: Weak<OwnerRegistry>) -> Self {
        Self {
            id,
            kind,
            state: Mutex::new(OwnerState {
                phase: Phase::Growing,
                held: Vec::new(),
                blocks: Vec::new(),
                signal: None,
                interrupt_pending: false,
            }),
            registry,
        }
    }

    pub(crate) fn thread(id: OwnerId, registry: Weak<OwnerRegistry>) -> Self {
        let current = std::thread::current();
        let kind = OwnerKind::Thread(ThreadOwner {
            thread: current.id(),
            name: current.name().map(str::to_string),
        });
        Self::new(id, kind, registry)
    }

    pub(crate) fn transaction(
        id: OwnerId,
        identifier: Option<Bytes>,
        parent: Option<OwnerRef>,
        registry: Weak<OwnerRegistry>,
    ) -> Self {
        let kind = OwnerKind::Transaction(TransactionOwner { identifier, parent });
        Self::new(id, kind, registry)
    }

    /// Returns the owner's ID.
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Returns the owner's kind.
    pub fn kind(&self) -> &OwnerKind {
        &self.kind
    }

    /// Returns true for transaction owners.
    pub fn is_transaction(&self) -> bool {
        matches!(self.kind, OwnerKind::Transaction(_))
    }

    /// Returns the enclosing transaction of a nested transaction.
    pub fn parent(&self) -> Option<&OwnerRef> {
        match &self.kind {
            OwnerKind::Transaction(txn) => txn.parent.as_ref(),
            OwnerKind::Thread(_) => None,
        }
    }

    /// Returns the nesting depth (0 for top-level owners).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent();
        while let Some(parent) = cursor {
            depth += 1;
            cursor = parent.parent();
        }
        depth
    }

    /// Returns true if `id` names an ancestor of this owner.
    pub(crate) fn has_ancestor(&self, id: OwnerId) -> bool {
        let mut cursor = self.parent();
        while let Some(parent) = cursor {
            if parent.id == id {
                return true;
            }
            cursor = parent.parent();
        }
        false
    }

    /// Returns true if `child` is a descendant transaction of this owner.
    ///
    /// Threads have no descendants.
    pub fn is_parent_of(&self, child: &LockOwner) -> bool {
        match self.kind {
            OwnerKind::Thread(_) => false,
            OwnerKind::Transaction(_) => child.has_ancestor(self.id),
        }
    }

    /// Returns the opaque correlation token of this owner.
    pub fn identifier(&self) -> Option<Bytes> {
        match &self.kind {
            OwnerKind::Transaction(txn) => txn.identifier.clone(),
            OwnerKind::Thread(_) => None,
        }
    }

    /// Returns the thread or transaction this owner stands for.
    pub fn actual_owner(&self) -> ActualOwner {
        match &self.kind {
            OwnerKind::Thread(thread) => ActualOwner::Thread(thread.thread),
            OwnerKind::Transaction(_) => ActualOwner::Transaction(self.id),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Returns true while the owner may acquire new locks.
    pub fn is_growing(&self) -> bool {
        self.phase() == Phase::Growing
    }

    /// Returns the number of grant entries this owner holds.
    pub fn lock_count(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Returns the (resource, mode) pairs this owner holds.
    pub fn held_locks(&self) -> Vec<(ResourceId, LockMode)> {
        self.state
            .lock()
            .held
            .iter()
            .map(|h| (h.resource.clone(), h.mode))
            .collect()
    }

    /// Returns the number of requests of this owner currently blocked.
    pub fn blocked_count(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Enters the shrinking phase.
    ///
    /// Outstanding waits of this owner end with `Aborted`, or with
    /// `DeadlockDetected` if the owner was marked as a deadlock victim.
    pub fn shrinking(&self) {
        let (blocks, signal) = {
            let mut state = self.state.lock();
            if state.phase == Phase::Growing {
                debug!(owner = %self.id, "owner shrinking");
            }
            state.phase = Phase::Shrinking;
            let signal = *state.signal.get_or_insert(WakeSignal::Aborted);
            (state.blocks.clone(), signal)
        };
        for waiter in blocks {
            waiter.signal(signal);
        }
    }

    /// Records an external abort and enters the shrinking phase.
    pub fn mark_aborted(&self) {
        self.state.lock().signal.get_or_insert(WakeSignal::Aborted);
        self.shrinking();
    }

    /// Records that a deadlock detector chose this owner as victim and
    /// enters the shrinking phase.
    pub fn mark_deadlocked(&self) {
        self.state
            .lock()
            .signal
            .get_or_insert(WakeSignal::DeadlockDetected);
        self.shrinking();
    }

    /// Interrupts the owner's blocked requests.
    ///
    /// If nothing is blocked, the next blocking request is interrupted as
    /// soon as it would start waiting.
    pub fn interrupt(&self) {
        let blocks = {
            let mut state = self.state.lock();
            if state.blocks.is_empty() {
                state.interrupt_pending = true;
            }
            state.blocks.clone()
        };
        for waiter in blocks {
            waiter.signal(WakeSignal::Interrupted);
        }
    }

    /// Enters the shrinking phase, releases every lock this owner holds,
    /// and removes it from the owner registry.
    pub fn discard(&self) {
        self.shrinking();
        let released = self.release_all();
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.id);
        }
        debug!(owner = %self.id, released, "owner discarded");
    }

    /// Releases every lock this owner (and its descendants) hold without
    /// ending the owner.
    ///
    /// Only allowed while growing.
    pub fn drop_locks(&self) -> LockResult<()> {
        if !self.is_growing() {
            return Err(LockError::NotGrowing { owner: self.id });
        }
        let released = self.release_all();
        debug!(owner = %self.id, released, "owner dropped locks");
        Ok(())
    }

    /// Drops this owner's locks on every lock set it references.
    fn release_all(&self) -> usize {
        let sets: Vec<Arc<LockSet>> = {
            let mut state = self.state.lock();
            state.held.retain(|h| h.lock_set.strong_count() > 0);
            let mut sets: Vec<Arc<LockSet>> = Vec::new();
            for held in &state.held {
                if let Some(set) = held.lock_set.upgrade() {
                    if !sets.iter().any(|s| Arc::ptr_eq(s, &set)) {
                        sets.push(set);
                    }
                }
            }
            sets
        };
        let count = sets.len();
        for set in sets {
            set.drop_owner(self);
        }
        count
    }

    /// Links a new grant entry; refused once shrinking.
    pub(crate) fn link(
        &self,
        lock_set: Weak<LockSet>,
        resource: &ResourceId,
        mode: LockMode,
    ) -> Result<(), GrantFailure> {
        let mut state = self.state.lock();
        if state.phase == Phase::Shrinking {
            return Err(GrantFailure::OwnerShrinking);
        }
        state.held.push(HeldLock {
            lock_set,
            resource: resource.clone(),
            mode,
        });
        Ok(())
    }

    /// Unlinks one grant entry for (`lock_set`, `mode`).
    pub(crate) fn unlink(&self, lock_set: &Weak<LockSet>, mode: LockMode) {
        let mut state = self.state.lock();
        if let Some(pos) = state
            .held
            .iter()
            .position(|h| h.mode == mode && Weak::ptr_eq(&h.lock_set, lock_set))
        {
            state.held.swap_remove(pos);
        }
    }

    /// Records a blocked request so signals can reach it.
    pub(crate) fn register_block(&self, waiter: &Arc<BlockedOwner>) -> Result<(), GrantFailure> {
        let mut state = self.state.lock();
        if state.phase == Phase::Shrinking {
            return Err(match state.signal {
                Some(WakeSignal::DeadlockDetected) => GrantFailure::DeadlockDetected,
                _ => GrantFailure::Aborted,
            });
        }
        if state.interrupt_pending {
            state.interrupt_pending = false;
            return Err(GrantFailure::Interrupted);
        }
        state.blocks.push(Arc::clone(waiter));
        Ok(())
    }

    /// Forgets a blocked request once it has left the queue.
    pub(crate) fn unregister_block(&self, waiter: &Arc<BlockedOwner>) {
        self.state.lock().blocks.retain(|b| !Arc::ptr_eq(b, waiter));
    }
}

impl fmt::Debug for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LockOwner")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("phase", &state.phase)
            .field("locks", &state.held.len())
            .field("blocked", &state.blocks.len())
            .finish()
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OwnerKind::Thread(thread) => match &thread.name {
                Some(name) => write!(f, "thread {} ({})", self.id, name),
                None => write!(f, "thread {}", self.id),
            },
            OwnerKind::Transaction(_) => write!(f, "txn {}", self.id),
        }
    }
}
