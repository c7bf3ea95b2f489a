//! Tandem error types.
//!
//! Provides the error type collaborators of the lock manager (transaction
//! completion, resource pools, configuration loading) deal with.

use std::fmt;
use thiserror::Error;

use crate::types::{OwnerId, ResourceId};

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Operation was interrupted.
    Interrupted = 0x0005,

    // Lock errors (0x0300 - 0x03FF)
    /// Transaction was aborted.
    TransactionAborted = 0x0300,
    /// Lock request conflicts with a lock held by another owner.
    LockConflict = 0x0301,
    /// Deadlock detected.
    Deadlock = 0x0302,
    /// Lock wait timed out.
    LockTimeout = 0x0303,
    /// Lock is not held by the owner releasing it.
    LockNotHeld = 0x0304,
    /// Owner is in its shrinking phase.
    OwnerShrinking = 0x0305,

    // Configuration errors (0x0700 - 0x07FF)
    /// Invalid configuration.
    InvalidConfig = 0x0700,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x03 => "Lock",
            0x07 => "Configuration",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for Tandem.
///
/// Lock failures arrive here converted from the lock manager's own error
/// type, carrying the resource and owner involved so a collaborator can
/// decide whether to retry or roll back.
///
/// # Example
///
/// ```rust
/// use tandem_common::error::{ErrorCode, TandemError};
/// use tandem_common::types::{OwnerId, ResourceId};
///
/// let err = TandemError::LockConflict {
///     owner: OwnerId::new(3),
///     resource: ResourceId::table(1),
///     mode: "W".into(),
/// };
/// assert_eq!(err.code(), ErrorCode::LockConflict);
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum TandemError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Operation was interrupted.
    #[error("operation was interrupted")]
    Interrupted,

    // ==========================================================================
    // Lock Errors
    // ==========================================================================
    /// Lock request conflicts with a lock held by another owner.
    #[error("owner {owner} cannot lock {resource} in mode {mode}: conflicting lock held")]
    LockConflict {
        /// The requesting owner.
        owner: OwnerId,
        /// The contended resource.
        resource: ResourceId,
        /// The requested mode.
        mode: String,
    },

    /// The owner was aborted while waiting for a lock.
    #[error("owner {owner} aborted: {reason}")]
    TransactionAborted {
        /// The aborted owner.
        owner: OwnerId,
        /// Reason for abort.
        reason: String,
    },

    /// Deadlock detected.
    #[error("deadlock detected, owner {owner} was chosen as victim")]
    Deadlock {
        /// The owner that was chosen as victim.
        owner: OwnerId,
    },

    /// An owner in its shrinking phase asked for a new lock.
    #[error("owner {owner} is shrinking and cannot acquire new locks")]
    OwnerShrinking {
        /// The shrinking owner.
        owner: OwnerId,
    },

    /// The wait for a lock ran past its deadline.
    #[error("owner {owner} timed out waiting for {resource} in mode {mode}")]
    LockTimeout {
        /// The waiting owner.
        owner: OwnerId,
        /// The contended resource.
        resource: ResourceId,
        /// The requested mode.
        mode: String,
    },

    /// Released a lock that is not held.
    #[error("owner {owner} does not hold {resource} in mode {mode}")]
    LockNotHeld {
        /// The releasing owner.
        owner: OwnerId,
        /// The resource involved.
        resource: ResourceId,
        /// The mode that was released.
        mode: String,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl TandemError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Interrupted => ErrorCode::Interrupted,
            Self::LockConflict { .. } => ErrorCode::LockConflict,
            Self::TransactionAborted { .. } => ErrorCode::TransactionAborted,
            Self::Deadlock { .. } => ErrorCode::Deadlock,
            Self::OwnerShrinking { .. } => ErrorCode::OwnerShrinking,
            Self::LockTimeout { .. } => ErrorCode::LockTimeout,
            Self::LockNotHeld { .. } => ErrorCode::LockNotHeld,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns true if the operation may succeed when retried later.
    ///
    /// An interrupted wait was cancelled on purpose and is not retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::LockConflict { .. })
    }

    /// Returns true if the owner should roll back its transaction.
    ///
    /// A shrinking owner is already finishing, so `OwnerShrinking` is
    /// neither.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. } | Self::Deadlock { .. })
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = TandemError::Deadlock {
            owner: OwnerId::new(42),
        };
        assert_eq!(err.code(), ErrorCode::Deadlock);
        assert_eq!(err.code().category(), "Lock");
        assert_eq!(ErrorCode::InvalidConfig.category(), "Configuration");
        assert_eq!(ErrorCode::LockNotHeld.as_u16(), 0x0304);
    }

    #[test]
    fn test_error_display() {
        let err = TandemError::LockNotHeld {
            owner: OwnerId::new(2),
            resource: ResourceId::table(7),
            mode: "R".to_string(),
        };
        assert_eq!(err.to_string(), "owner 2 does not hold Table(7) in mode R");
    }

    #[test]
    fn test_retryable_and_abort() {
        let err = TandemError::LockTimeout {
            owner: OwnerId::new(1),
            resource: ResourceId::table(2),
            mode: "W".into(),
        };
        assert_eq!(err.code(), ErrorCode::LockTimeout);
        assert!(err.is_retryable());
        assert!(!err.is_abort());
        assert!(!TandemError::Interrupted.is_retryable());
        assert!(!TandemError::invalid_config("bad").is_retryable());

        let err = TandemError::OwnerShrinking {
            owner: OwnerId::new(1),
        };
        assert!(!err.is_abort());
        assert!(!err.is_retryable());
        assert!(TandemError::Deadlock { owner: OwnerId::new(1) }.is_abort());
    }
}
