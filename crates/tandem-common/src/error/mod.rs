//! Error handling for Tandem.
//!
//! This module provides the workspace-wide error type and result alias.
//! Component crates keep their own precise error enums and convert into
//! [`TandemError`] at their boundary.

mod tandem;

pub use tandem::{ErrorCode, TandemError};

/// Result type alias for Tandem operations.
pub type TandemResult<T> = std::result::Result<T, TandemError>;
