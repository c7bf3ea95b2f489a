//! Configuration for Tandem.
//!
//! This module provides configuration structures for the lock manager.

mod lock;

pub use lock::LockConfig;
