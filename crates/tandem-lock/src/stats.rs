//! Lock statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

/// Statistics shared by every lock set created from one factory.
#[derive(Debug)]
pub struct LockStats {
    enabled: AtomicBool,
    /// New grant records created.
    pub grants: AtomicU64,
    /// Re-entrant acquisitions of an already held mode.
    pub reentries: AtomicU64,
    /// Requests satisfied by sharing an ancestor's grant.
    pub shared_grants: AtomicU64,
    /// Grant records released by `unlock`.
    pub releases: AtomicU64,
    /// Requests refused immediately because of a conflict.
    pub conflicts: AtomicU64,
    /// Requests that had to wait in a queue.
    pub waits: AtomicU64,
    /// Waits that ended in a timeout.
    pub timeouts: AtomicU64,
    /// Waits ended because the owner was aborted.
    pub aborts: AtomicU64,
    /// Waits ended because the owner was a deadlock victim.
    pub deadlocks: AtomicU64,
    /// Waits ended by an interrupt.
    pub interrupts: AtomicU64,
    /// Completed mode changes.
    pub mode_changes: AtomicU64,
    /// Cascading drops performed on a lock set.
    pub drops: AtomicU64,
}

macro_rules! recorder {
    ($(#[$doc:meta] $name:ident => $field:ident),* $(,)?) => {
        $(
            #[$doc]
            pub fn $name(&self) {
                if self.enabled.load(AtomicOrdering::Relaxed) {
                    self.$field.fetch_add(1, AtomicOrdering::Relaxed);
                }
            }
        )*
    };
}

impl LockStats {
    /// Creates new stats.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            grants: AtomicU64::new(0),
            reentries: AtomicU64::new(0),
            shared_grants: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            deadlocks: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            mode_changes: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    recorder! {
        /// Records a new grant record.
        record_grant => grants,
        /// Records a re-entrant acquisition.
        record_reentry => reentries,
        /// Records a grant shared with an ancestor.
        record_shared_grant => shared_grants,
        /// Records a release.
        record_release => releases,
        /// Records an immediate conflict.
        record_conflict => conflicts,
        /// Records a wait.
        record_wait => waits,
        /// Records a timeout.
        record_timeout => timeouts,
        /// Records an abort.
        record_abort => aborts,
        /// Records a deadlock victim.
        record_deadlock => deadlocks,
        /// Records an interrupt.
        record_interrupt => interrupts,
        /// Records a mode change.
        record_mode_change => mode_changes,
        /// Records a cascading drop.
        record_drop => drops,
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> LockStatsSnapshot {
        let load = |c: &AtomicU64| c.load(AtomicOrdering::Relaxed);
        LockStatsSnapshot {
            grants: load(&self.grants),
            reentries: load(&self.reentries),
            shared_grants: load(&self.shared_grants),
            releases: load(&self.releases),
            conflicts: load(&self.conflicts),
            waits: load(&self.waits),
            timeouts: load(&self.timeouts),
            aborts: load(&self.aborts),
            deadlocks: load(&self.deadlocks),
            interrupts: load(&self.interrupts),
            mode_changes: load(&self.mode_changes),
            drops: load(&self.drops),
        }
    }
}

impl Default for LockStats {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Plain copy of [`LockStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStatsSnapshot {
    /// New grant records created.
    pub grants: u64,
    /// Re-entrant acquisitions.
    pub reentries: u64,
    /// Grants shared with an ancestor.
    pub shared_grants: u64,
    /// Releases.
    pub releases: u64,
    /// Immediate conflicts.
    pub conflicts: u64,
    /// Waits.
    pub waits: u64,
    /// Timeouts.
    pub timeouts: u64,
    /// Aborted waits.
    pub aborts: u64,
    /// Deadlock victims.
    pub deadlocks: u64,
    /// Interrupted waits.
    pub interrupts: u64,
    /// Mode changes.
    pub mode_changes: u64,
    /// Cascading drops.
    pub drops: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_stats() {
        let stats = LockStats::new(true);
        stats.record_grant();
        stats.record_grant();
        stats.record_timeout();

        let snap = stats.snapshot();
        assert_eq!(snap.grants, 2);
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.releases, 0);
    }

    #[test]
    fn test_disabled_stats() {
        let stats = LockStats::new(false);
        stats.record_grant();
        assert_eq!(stats.snapshot(), LockStatsSnapshot::default());
    }
}
