//! Shared helpers for the integration test suite.

use std::sync::atomic::{AtomicU32, Ordering};

/// Counter for unique database file names
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A unique SQLite database URL for one test.
///
/// Each test gets its own file so tests stay isolated regardless of the
/// runner's process model; any leftover file from a previous run is
/// removed first.
pub fn sqlite_test_url(prefix: &str) -> String {
	let test_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let db_file = format!("/tmp/margin_{}_{}_{}.db", prefix, pid, test_id);
	let _ = std::fs::remove_file(&db_file);
	format!("sqlite://{}?mode=rwc", db_file)
}
