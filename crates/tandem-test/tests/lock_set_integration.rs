//! Lock set integration tests.
//!
//! These tests drive lock sets from several threads and check the
//! observable locking guarantees: exclusion, reentrancy, ancestor sharing,
//! FIFO wakeups, mode changes and cascading drops.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tandem_lock::{GrantFailure, LockError, LockMode};
use tandem_test::utils::{spawn_lock, wait_for_queue, Fixture};

const LONG: Duration = Duration::from_secs(10);

#[test]
fn test_write_excludes_unrelated_owner() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let a = fx.txn("a");
    let b = fx.txn("b");

    set.lock(&a, LockMode::Write).unwrap();
    for mode in LockMode::ALL {
        assert_eq!(set.try_lock(&b, mode), Ok(false));
        let err = set.lock(&b, mode).unwrap_err();
        assert_eq!(err.reason(), Some(GrantFailure::Conflict));
    }
    assert!(set.holders().iter().all(|h| h.owner == a.id()));
}

#[test]
fn test_try_lock_after_release() {
    let fx = Fixture::new();
    let set = fx.manager.factory().create();
    let a = fx.txn("a");
    let b = fx.txn("b");

    set.lock(&a, LockMode::Write).unwrap();
    assert_eq!(set.try_lock(&b, LockMode::Read), Ok(false));
    set.unlock(&a, LockMode::Write).unwrap();
    assert_eq!(set.try_lock(&b, LockMode::Read), Ok(true));
    set.unlock(&b, LockMode::Read).unwrap();

    assert!(!set.is_locked());
    assert_eq!(a.lock_count(), 0);
    assert_eq!(b.lock_count(), 0);
}

#[test]
fn test_reentrant_lock_needs_matching_unlocks() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let a = fx.txn("a");
    let b = fx.txn("b");

    for _ in 0..3 {
        set.lock(&a, LockMode::Upgrade).unwrap();
    }
    for _ in 0..2 {
        set.unlock(&a, LockMode::Upgrade).unwrap();
        assert_eq!(set.try_lock(&b, LockMode::Upgrade), Ok(false));
    }
    set.unlock(&a, LockMode::Upgrade).unwrap();
    assert_eq!(set.try_lock(&b, LockMode::Upgrade), Ok(true));

    let err = set.unlock(&a, LockMode::Upgrade).unwrap_err();
    assert!(matches!(err, LockError::NotHeld { .. }));
}

#[test]
fn test_nested_read_shares_parent_entry() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let parent = fx.txn("parent");
    let child = fx.nested(&parent);

    set.lock(&parent, LockMode::Read).unwrap();
    set.lock(&child, LockMode::Read).unwrap();

    let holders = set.holders();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].owner, parent.id());
    assert_eq!(holders[0].count, 1);

    set.unlock(&child, LockMode::Read).unwrap();
    assert!(set.holds(&parent, LockMode::Read));
    assert_eq!(set.holders()[0].count, 1);
}

#[test]
fn test_nested_write_under_parent_write() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let parent = fx.txn("parent");
    let child = fx.nested(&parent);
    let grandchild = fx.nested(&child);
    let other = fx.txn("other");

    set.lock(&parent, LockMode::Write).unwrap();
    set.lock(&child, LockMode::Write).unwrap();
    set.lock(&grandchild, LockMode::Read).unwrap();
    assert_eq!(set.try_lock(&other, LockMode::ReadIntent), Ok(false));

    // A parent is not covered by its children's locks.
    set.unlock(&parent, LockMode::Write).unwrap();
    assert_eq!(set.try_lock(&parent, LockMode::Read), Ok(false));
    assert!(set.holds(&child, LockMode::Write));
}

#[test]
fn test_shrinking_owner_refused_without_conflict() {
    let fx = Fixture::new();
    let held = fx.table(1);
    let fresh = fx.table(2);
    let a = fx.txn("a");

    held.lock(&a, LockMode::Read).unwrap();
    a.shrinking();

    for mode in LockMode::ALL {
        let err = fresh.lock(&a, mode).unwrap_err();
        assert_eq!(err.reason(), Some(GrantFailure::OwnerShrinking));
        assert!(fresh.try_lock(&a, mode).is_err());
    }
    assert!(!fresh.is_locked());

    held.lock(&a, LockMode::Read).unwrap();
    held.unlock(&a, LockMode::Read).unwrap();
    held.unlock(&a, LockMode::Read).unwrap();
    assert!(!held.is_locked());
}

#[test]
fn test_cascading_drop_through_coordinator() {
    let fx = Fixture::new();
    let table = fx.table(1);
    let row_a = fx.row(&table, "a");
    let row_b = fx.row(&table, "b");
    let owner = fx.txn("owner");
    let other = fx.txn("other");

    table.lock(&owner, LockMode::WriteIntent).unwrap();
    row_a.lock(&owner, LockMode::Write).unwrap();
    row_b.lock(&owner, LockMode::Read).unwrap();
    row_b.lock(&other, LockMode::Read).unwrap();

    table.coordinator(&owner).drop_locks();

    assert!(!table.is_locked());
    assert!(!row_a.is_locked());
    assert!(!row_b.holds(&owner, LockMode::Read));
    assert!(row_b.holds(&other, LockMode::Read));
    assert_eq!(owner.lock_count(), 0);
    assert_eq!(other.lock_count(), 1);
}

#[test]
fn test_cascading_drop_covers_descendants() {
    let fx = Fixture::new();
    let table = fx.table(1);
    let row = fx.row(&table, "k");
    let parent = fx.txn("parent");
    let child = fx.nested(&parent);

    table.lock(&parent, LockMode::WriteIntent).unwrap();
    row.lock(&child, LockMode::Write).unwrap();

    table.coordinator(&parent).drop_locks();
    assert!(!row.is_locked());
    assert_eq!(child.lock_count(), 0);
}

#[test]
fn test_cascading_drop_wakes_waiter() {
    let fx = Fixture::new();
    let table = fx.table(1);
    let row = fx.row(&table, "k");
    let owner = fx.txn("owner");
    let waiter = fx.txn("waiter");

    row.lock(&owner, LockMode::Write).unwrap();
    let handle = spawn_lock(&row, &waiter, LockMode::Write, LONG);
    wait_for_queue(&row, 1);

    table.coordinator(&owner).drop_locks();
    handle.join().unwrap().unwrap();
    assert!(row.holds(&waiter, LockMode::Write));
}

#[test]
fn test_fifo_wake_order() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let holder = fx.txn("holder");
    let w1 = fx.txn("w1");
    let w2 = fx.txn("w2");

    set.lock(&holder, LockMode::Write).unwrap();
    let first = spawn_lock(&set, &w1, LockMode::Write, LONG);
    wait_for_queue(&set, 1);
    let second = spawn_lock(&set, &w2, LockMode::Write, LONG);
    wait_for_queue(&set, 2);
    assert_eq!(
        set.waiting(),
        vec![(w1.id(), LockMode::Write), (w2.id(), LockMode::Write)]
    );

    set.unlock(&holder, LockMode::Write).unwrap();
    first.join().unwrap().unwrap();
    assert!(set.holds(&w1, LockMode::Write));
    assert_eq!(set.waiting(), vec![(w2.id(), LockMode::Write)]);

    set.unlock(&w1, LockMode::Write).unwrap();
    second.join().unwrap().unwrap();
    assert!(set.holds(&w2, LockMode::Write));
    assert_eq!(set.queue_len(), 0);
}

#[test]
fn test_compatible_waiters_all_granted() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let writer = fx.txn("writer");
    let readers: Vec<_> = (0..4).map(|_| fx.txn("reader")).collect();

    set.lock(&writer, LockMode::Write).unwrap();
    let handles: Vec<_> = readers
        .iter()
        .enumerate()
        .map(|(i, reader)| {
            let handle = spawn_lock(&set, reader, LockMode::Read, LONG);
            wait_for_queue(&set, i + 1);
            handle
        })
        .collect();

    set.unlock(&writer, LockMode::Write).unwrap();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(readers.iter().all(|r| set.holds(r, LockMode::Read)));
}

#[test]
fn test_writer_waits_for_every_holder() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let reader = fx.txn("reader");
    let upgrader = fx.txn("upgrader");
    let writer = fx.txn("writer");
    let intent = fx.txn("intent");

    set.lock(&reader, LockMode::Read).unwrap();
    set.lock(&upgrader, LockMode::Upgrade).unwrap();
    let w = spawn_lock(&set, &writer, LockMode::Write, LONG);
    wait_for_queue(&set, 1);

    // Nothing held conflicts with ReadIntent, so it does not queue.
    set.lock(&intent, LockMode::ReadIntent).unwrap();

    set.unlock(&upgrader, LockMode::Upgrade).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(set.queue_len(), 1);
    assert!(!set.holds(&writer, LockMode::Write));

    set.unlock(&reader, LockMode::Read).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(set.queue_len(), 1);

    set.unlock(&intent, LockMode::ReadIntent).unwrap();
    w.join().unwrap().unwrap();
    assert!(set.holds(&writer, LockMode::Write));
}

#[test]
fn test_change_mode_blocks_until_other_reader_leaves() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let a = fx.txn("a");
    let c = fx.txn("c");

    set.lock(&a, LockMode::Read).unwrap();
    set.lock(&c, LockMode::Read).unwrap();

    let err = set
        .change_mode(&a, LockMode::Read, LockMode::Write)
        .unwrap_err();
    assert_eq!(err.reason(), Some(GrantFailure::Conflict));
    assert!(set.holds(&a, LockMode::Read));

    let upgrade = {
        let set = Arc::clone(&set);
        let a = Arc::clone(&a);
        thread::spawn(move || set.change_mode_timeout(&a, LockMode::Read, LockMode::Write, LONG))
    };
    wait_for_queue(&set, 1);
    assert!(set.holds(&a, LockMode::Read));
    assert!(!set.holds(&a, LockMode::Write));

    set.unlock(&c, LockMode::Read).unwrap();
    upgrade.join().unwrap().unwrap();
    assert!(set.holds(&a, LockMode::Write));
    assert!(!set.holds(&a, LockMode::Read));
    assert_eq!(fx.manager.stats().mode_changes, 1);
}

#[test]
fn test_change_mode_timeout_keeps_old_mode() {
    let fx = Fixture::new();
    let set = fx.table(1);
    let a = fx.txn("a");
    let c = fx.txn("c");

    set.lock(&a, LockMode::Upgrade).unwrap();
    set.lock(&c, LockMode::Read).unwrap();

    let err = set
        .change_mode_timeout(&a, LockMode::Upgrade, LockMode::Write, Duration::from_millis(30))
        .unwrap_err();
    assert_eq!(err.reason(), Some(GrantFailure::Timeout));
    assert!(set.holds(&a, LockMode::Upgrade));
    assert_eq!(set.queue_len(), 0);
}

#[test]
fn test_lock_wait_uses_default_timeout() {
    let fx = Fixture::with_config(
        tandem_common::config::LockConfig::for_testing()
            .with_default_timeout(Duration::from_millis(40)),
    );
    let set = fx.table(1);
    let a = fx.txn("a");
    let b = fx.txn("b");

    set.lock(&a, LockMode::Write).unwrap();
    let err = set.lock_wait(&b, LockMode::Write).unwrap_err();
    assert_eq!(err.reason(), Some(GrantFailure::Timeout));
    assert!(err.is_retryable());
}
