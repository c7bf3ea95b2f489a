//! Test utilities.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tandem_common::config::LockConfig;
use tandem_common::types::ResourceId;
use tandem_lock::{LockManager, LockMode, LockResult, LockSet, OwnerRef};
use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber for tests.
///
/// Honors `RUST_LOG` and falls back to `warn`. Safe to call from every
/// test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_test_writer()
        .try_init();
}

/// A lock manager with short test timeouts.
pub struct Fixture {
    /// The manager under test.
    pub manager: Arc<LockManager>,
}

impl Fixture {
    /// Creates a fixture using [`LockConfig::for_testing`].
    pub fn new() -> Self {
        Self::with_config(LockConfig::for_testing())
    }

    /// Creates a fixture with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_config(config: LockConfig) -> Self {
        init_tracing();
        let manager = LockManager::with_config(config).expect("valid test config");
        Self {
            manager: Arc::new(manager),
        }
    }

    /// Creates a lock set for table `id`.
    pub fn table(&self, id: u64) -> Arc<LockSet> {
        self.manager.factory().create_with_id(ResourceId::table(id))
    }

    /// Creates a row lock set subordinate to `table`.
    ///
    /// # Panics
    ///
    /// Panics if `table` does not protect a table resource.
    pub fn row(&self, table: &Arc<LockSet>, key: &'static str) -> Arc<LockSet> {
        let table_id = table.id().table_id().expect("table lock set");
        self.manager
            .factory()
            .create_related(ResourceId::row(table_id, key), table)
    }

    /// Begins a top-level transaction tagged with `name`.
    pub fn txn(&self, name: &'static str) -> OwnerRef {
        self.manager
            .begin_transaction(Some(Bytes::from_static(name.as_bytes())))
    }

    /// Begins a transaction nested in `parent`.
    pub fn nested(&self, parent: &OwnerRef) -> OwnerRef {
        self.manager.begin_nested(parent, None)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a thread that requests `mode` on `set` for `owner`, waiting up to
/// `timeout`.
pub fn spawn_lock(
    set: &Arc<LockSet>,
    owner: &OwnerRef,
    mode: LockMode,
    timeout: Duration,
) -> JoinHandle<LockResult<()>> {
    let set = Arc::clone(set);
    let owner = Arc::clone(owner);
    thread::spawn(move || set.lock_timeout(&owner, mode, timeout))
}

/// Waits until `set` has `len` queued requests.
///
/// # Panics
///
/// Panics if the queue does not reach `len` within five seconds.
pub fn wait_for_queue(set: &LockSet, len: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while set.queue_len() < len {
        assert!(
            Instant::now() < deadline,
            "queue of {} stuck at {} waiting for {}",
            set.id(),
            set.queue_len(),
            len
        );
        thread::sleep(Duration::from_millis(1));
    }
}
