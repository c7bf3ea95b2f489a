//! Tandem Lock Manager Benchmarks
//!
//! This crate contains benchmarks for the lock manager:
//! - Uncontended acquire/release per mode
//! - Re-entrant and ancestor-shared acquisition
//! - Contended acquisition across threads
//! - Cascading drops over related lock sets
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tandem-bench
//! ```

pub mod utils;
