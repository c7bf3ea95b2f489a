//! # tandem-lock
//!
//! Multi-granularity lock manager for Tandem.
//!
//! This crate grants, queues, upgrades and releases locks on abstract
//! resources on behalf of threads or transactions:
//!
//! - **Lock Modes**: five modes (IR, R, U, IW, W) with intention locks for
//!   hierarchical locking.
//!
//! - **Reentrancy**: an owner may take a mode it already holds any number
//!   of times; nested transactions share their ancestors' grants.
//!
//! - **Fair Blocking**: conflicting requests wait in a FIFO queue with a
//!   timeout, and can be interrupted or aborted.
//!
//! - **Two-Phase Locking**: an owner that starts shrinking may not take new
//!   locks; its locks are dropped en masse, cascading through subordinate
//!   lock sets.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LockManager                           │
//! │                             │                                │
//! │        ┌────────────────────┼─────────────────────┐          │
//! │        ▼                    ▼                     ▼          │
//! │ ┌───────────────┐   ┌───────────────┐   ┌─────────────────┐  │
//! │ │ OwnerRegistry │   │ LockSetFactory│   │  thread owners  │  │
//! │ └───────────────┘   └───────────────┘   └─────────────────┘  │
//! │                             │                                │
//! │                             ▼                                │
//! │   ┌──────────────────────────────────────────────────────┐   │
//! │   │ LockSet (one per resource)                           │   │
//! │   │   chains:  [IR] [R] [U] [IW] [W]                     │   │
//! │   │   queue:   BlockedOwner → BlockedOwner → ...         │   │
//! │   │   subordinates: LockSet, LockSet, ...                │   │
//! │   └──────────────────────────────────────────────────────┘   │
//! │                             │                                │
//! │                             ▼                                │
//! │                     LockCoordinator                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use tandem_lock::{LockManager, LockMode};
//! use tandem_common::types::ResourceId;
//!
//! let manager = LockManager::new();
//! let table = manager.factory().create_with_id(ResourceId::table(1));
//! let row = manager.factory().create_related(ResourceId::row(1, "k"), &table);
//!
//! let txn = manager.begin_transaction(None);
//! table.lock(&txn, LockMode::WriteIntent).unwrap();
//! row.lock(&txn, LockMode::Write).unwrap();
//!
//! // Commit: drop everything the transaction holds under the table.
//! table.coordinator(&txn).drop_locks();
//! assert!(!row.is_locked());
//! txn.discard();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Lock modes and their conflict table.
pub mod mode;

/// Lock errors.
pub mod error;

/// Lock statistics.
pub mod stats;

/// Wait-queue nodes.
pub mod waiter;

/// Lock owners and the owner registry.
///
/// This module provides:
/// - [`owner::LockOwner`]: Thread or transaction holding locks
/// - [`owner::OwnerRegistry`]: Enumerable set of live owners
pub mod owner;

/// Lock sets.
pub mod set;

/// Lock coordinators.
pub mod coordinator;

/// Lock set construction.
pub mod factory;

/// Lock manager state.
pub mod manager;

pub use coordinator::LockCoordinator;
pub use error::{GrantFailure, LockError, LockResult};
pub use factory::LockSetFactory;
pub use manager::{LockManager, OwnerResolver};
pub use mode::LockMode;
pub use owner::{ActualOwner, LockOwner, OwnerKind, OwnerRef, OwnerRegistry, Phase};
pub use set::{LockInfo, LockSet};
pub use stats::{LockStats, LockStatsSnapshot};
pub use waiter::{BlockedOwner, WakeSignal};
