//! Lock manager errors.

use std::fmt;

use tandem_common::error::TandemError;
use tandem_common::types::{OwnerId, ResourceId};
use thiserror::Error;

use crate::mode::LockMode;

/// Why a lock request was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantFailure {
    /// A conflicting lock is held and the request could not wait.
    Conflict,
    /// The wait deadline elapsed.
    Timeout,
    /// The wait was interrupted.
    Interrupted,
    /// The owner was aborted while waiting.
    Aborted,
    /// The owner was chosen as a deadlock victim while waiting.
    DeadlockDetected,
    /// The owner is shrinking and may not acquire new locks.
    OwnerShrinking,
}

impl GrantFailure {
    /// Returns true if the same request may succeed later.
    ///
    /// An interrupt cancels the wait on purpose, so it is not retryable.
    pub const fn is_retryable(self) -> bool {
        matches!(self, GrantFailure::Conflict | GrantFailure::Timeout)
    }

    /// Returns true if the owner's transaction should be rolled back.
    pub const fn is_abort(self) -> bool {
        matches!(self, GrantFailure::Aborted | GrantFailure::DeadlockDetected)
    }
}

impl fmt::Display for GrantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GrantFailure::Conflict => "conflicting lock held",
            GrantFailure::Timeout => "timed out",
            GrantFailure::Interrupted => "interrupted",
            GrantFailure::Aborted => "owner aborted",
            GrantFailure::DeadlockDetected => "deadlock detected",
            GrantFailure::OwnerShrinking => "owner is shrinking",
        };
        f.write_str(s)
    }
}

/// Errors returned by lock sets and lock owners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The requested lock was not granted.
    #[error("lock {mode} on {resource} not granted to owner {owner}: {reason}")]
    NotGranted {
        /// The resource protected by the lock set.
        resource: ResourceId,
        /// The requested mode.
        mode: LockMode,
        /// The requesting owner.
        owner: OwnerId,
        /// Why the lock was not granted.
        reason: GrantFailure,
    },

    /// The owner does not hold the lock it tried to release or change.
    #[error("lock {mode} on {resource} not held by owner {owner}")]
    NotHeld {
        /// The resource protected by the lock set.
        resource: ResourceId,
        /// The mode that was expected to be held.
        mode: LockMode,
        /// The calling owner.
        owner: OwnerId,
    },

    /// A manual release was requested after the owner started shrinking.
    #[error("owner {owner} is no longer growing")]
    NotGrowing {
        /// The shrinking owner.
        owner: OwnerId,
    },
}

impl LockError {
    /// Returns the grant failure reason, if this is a `NotGranted` error.
    pub fn reason(&self) -> Option<GrantFailure> {
        match self {
            LockError::NotGranted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns true if the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        self.reason().map_or(false, GrantFailure::is_retryable)
    }

    /// Returns true if the owner's transaction should be rolled back.
    pub fn is_abort(&self) -> bool {
        self.reason().map_or(false, GrantFailure::is_abort)
    }

    /// Returns the owner the error concerns.
    pub fn owner(&self) -> OwnerId {
        match self {
            LockError::NotGranted { owner, .. }
            | LockError::NotHeld { owner, .. }
            | LockError::NotGrowing { owner } => *owner,
        }
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

impl From<LockError> for TandemError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::NotGranted {
                resource,
                mode,
                owner,
                reason,
            } => match reason {
                GrantFailure::Conflict => TandemError::LockConflict {
                    owner,
                    resource,
                    mode: mode.to_string(),
                },
                GrantFailure::Timeout => TandemError::LockTimeout {
                    owner,
                    resource,
                    mode: mode.to_string(),
                },
                GrantFailure::Interrupted => TandemError::Interrupted,
                GrantFailure::Aborted => TandemError::TransactionAborted {
                    owner,
                    reason: format!("aborted while waiting for {} on {}", mode, resource),
                },
                GrantFailure::DeadlockDetected => TandemError::Deadlock { owner },
                GrantFailure::OwnerShrinking => TandemError::OwnerShrinking { owner },
            },
            LockError::NotHeld {
                resource,
                mode,
                owner,
            } => TandemError::LockNotHeld {
                owner,
                resource,
                mode: mode.to_string(),
            },
            LockError::NotGrowing { owner } => TandemError::OwnerShrinking { owner },
        }
    }
}
