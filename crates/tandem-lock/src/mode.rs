//! Lock modes and their conflict relationships.
//!
//! Five modes support multi-granularity locking: intention modes are taken
//! on a coarse resource (a table) to announce read or write locks on finer
//! resources below it (its rows).
//!
//! # Conflict Matrix
//!
//! A requested mode (row) is blocked by any held mode marked `✗`, unless
//! the holder is the requester itself or one of its transactional
//! ancestors.
//!
//! ```text
//!          │ IR │ R  │ U  │ IW │ W  │
//! ─────────┼────┼────┼────┼────┼────┤
//!     IR   │ ✓  │ ✓  │ ✓  │ ✓  │ ✗  │
//!     R    │ ✓  │ ✓  │ ✓  │ ✗  │ ✗  │
//!     U    │ ✓  │ ✓  │ ✗  │ ✗  │ ✗  │
//!     IW   │ ✓  │ ✗  │ ✗  │ ✓  │ ✗  │
//!     W    │ ✗  │ ✗  │ ✗  │ ✗  │ ✗  │
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lock mode for a resource, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockMode {
    /// Intention to read finer-grained resources below this one.
    ReadIntent = 0,
    /// Shared read lock.
    Read = 1,
    /// Read lock that intends to become a write lock later.
    Upgrade = 2,
    /// Intention to write finer-grained resources below this one.
    WriteIntent = 3,
    /// Exclusive write lock.
    Write = 4,
}

const READ_INTENT_CONFLICTS: &[LockMode] = &[LockMode::Write];
const READ_CONFLICTS: &[LockMode] = &[LockMode::Write, LockMode::WriteIntent];
const UPGRADE_CONFLICTS: &[LockMode] = &[LockMode::Write, LockMode::WriteIntent, LockMode::Upgrade];
const WRITE_INTENT_CONFLICTS: &[LockMode] = &[LockMode::Write, LockMode::Upgrade, LockMode::Read];
const WRITE_CONFLICTS: &[LockMode] = &[
    LockMode::WriteIntent,
    LockMode::Read,
    LockMode::ReadIntent,
    LockMode::Upgrade,
    LockMode::Write,
];

impl LockMode {
    /// Number of lock modes.
    pub const COUNT: usize = 5;

    /// All modes in ordinal order.
    pub const ALL: [LockMode; Self::COUNT] = [
        LockMode::ReadIntent,
        LockMode::Read,
        LockMode::Upgrade,
        LockMode::WriteIntent,
        LockMode::Write,
    ];

    /// Returns the ordinal of this mode (0 = weakest).
    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Returns the mode with the given ordinal.
    pub fn from_ordinal(ordinal: usize) -> Option<LockMode> {
        Self::ALL.get(ordinal).copied()
    }

    /// Returns the held modes that block a request for this mode.
    pub const fn conflicts(self) -> &'static [LockMode] {
        match self {
            LockMode::ReadIntent => READ_INTENT_CONFLICTS,
            LockMode::Read => READ_CONFLICTS,
            LockMode::Upgrade => UPGRADE_CONFLICTS,
            LockMode::WriteIntent => WRITE_INTENT_CONFLICTS,
            LockMode::Write => WRITE_CONFLICTS,
        }
    }

    /// Checks if a request for this mode is blocked by `held`.
    pub fn conflicts_with(self, held: LockMode) -> bool {
        self.conflicts().contains(&held)
    }

    /// Checks if this lock mode can coexist with `other` held by an
    /// unrelated owner.
    pub fn is_compatible_with(self, other: LockMode) -> bool {
        !self.conflicts_with(other)
    }

    /// Returns true for the intention modes.
    pub const fn is_intention(self) -> bool {
        matches!(self, LockMode::ReadIntent | LockMode::WriteIntent)
    }

    /// Returns the short code used in logs.
    pub const fn code(self) -> &'static str {
        match self {
            LockMode::ReadIntent => "IR",
            LockMode::Read => "R",
            LockMode::Upgrade => "U",
            LockMode::WriteIntent => "IW",
            LockMode::Write => "W",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unknown lock mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lock mode '{0}'")]
pub struct ParseLockModeError(String);

impl FromStr for LockMode {
    type Err = ParseLockModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ir" | "readintent" | "read_intent" => Ok(LockMode::ReadIntent),
            "r" | "read" => Ok(LockMode::Read),
            "u" | "upgrade" => Ok(LockMode::Upgrade),
            "iw" | "writeintent" | "write_intent" => Ok(LockMode::WriteIntent),
            "w" | "write" => Ok(LockMode::Write),
            _ => Err(ParseLockModeError(s.to_string())),
        }
    }
}
