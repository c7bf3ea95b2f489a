//! # tandem-common
//!
//! Common types, errors, and configuration for Tandem.
//!
//! This crate holds the foundational pieces shared by the Tandem lock
//! manager and the collaborators that drive it:
//!
//! - **Types**: owner identifiers (`OwnerId`) and protected resource
//!   identifiers (`ResourceId`)
//! - **Errors**: unified error handling with `TandemError` and stable
//!   `ErrorCode`s
//! - **Config**: lock manager configuration (`LockConfig`)
//!
//! ## Example
//!
//! ```rust
//! use tandem_common::types::{OwnerId, ResourceId};
//! use tandem_common::config::LockConfig;
//!
//! let owner = OwnerId::new(7);
//! let row = ResourceId::row(1, "user:42");
//! assert_eq!(row.parent(), Some(ResourceId::table(1)));
//! assert!(LockConfig::default().validate().is_ok());
//! # let _ = owner;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::LockConfig;
pub use error::{ErrorCode, TandemError, TandemResult};
pub use types::{OwnerId, ResourceId};
