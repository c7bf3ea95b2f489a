//! # tandem-test
//!
//! Integration tests for the Tandem lock manager.
//!
//! This crate contains:
//! - Multi-threaded lock set tests (`tests/`)
//! - Test utilities and fixtures shared by those tests

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;
