//! Core identifier types for Tandem.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lock owner identifier - uniquely identifies a thread or transaction
/// owner within one lock manager.
///
/// Owner IDs are handed out monotonically by the lock manager and are
/// used to:
/// - Key grant records inside a lock set
/// - Correlate blocked owners for an external deadlock detector
/// - Find an owner in the owner registry
///
/// # Example
///
/// ```rust
/// use tandem_common::types::OwnerId;
///
/// let owner = OwnerId::new(1);
/// assert!(owner.is_valid());
/// assert_eq!(owner.next(), OwnerId::new(2));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Invalid owner ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Minimum valid owner ID.
    pub const MIN: Self = Self(1);

    /// Creates a new `OwnerId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next owner ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid owner ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "OwnerId(INVALID)")
        } else {
            write!(f, "OwnerId({})", self.0)
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OwnerId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<OwnerId> for u64 {
    #[inline]
    fn from(id: OwnerId) -> Self {
        id.0
    }
}
