//! Benchmark utilities and helpers.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tandem_common::types::ResourceId;
use tandem_lock::{LockManager, LockMode, LockSet};

/// Generates a reproducible sequence of lock modes.
///
/// `write_ratio` is the share of exclusive requests; the rest are spread
/// over the shared and intention modes.
pub fn generate_modes(count: usize, write_ratio: f64) -> Vec<LockMode> {
    let mut rng = StdRng::seed_from_u64(42);
    let shared = [LockMode::ReadIntent, LockMode::Read, LockMode::WriteIntent];
    (0..count)
        .map(|_| {
            if rng.gen_bool(write_ratio) {
                LockMode::Write
            } else {
                shared[rng.gen_range(0..shared.len())]
            }
        })
        .collect()
}

/// Creates a table lock set with `rows` subordinate row lock sets.
pub fn table_with_rows(manager: &LockManager, table: u64, rows: usize) -> (Arc<LockSet>, Vec<Arc<LockSet>>) {
    let factory = manager.factory();
    let table_set = factory.create_with_id(ResourceId::table(table));
    let row_sets = (0..rows)
        .map(|i| factory.create_related(ResourceId::row(table, format!("row_{:08}", i)), &table_set))
        .collect();
    (table_set, row_sets)
}
