//! Relational backend contract tests over SQLite.

use chrono::{Duration, Utc};
use margin_integration_tests::sqlite_test_url;
use margin_sessions::backends::{DatabaseSessionBackend, SessionBackend, SessionRecord};
use margin_sessions::error::SessionError;
use rstest::*;
use serial_test::serial;

/// Fixture providing a backend over a unique SQLite database.
#[fixture]
async fn backend() -> DatabaseSessionBackend {
	let url = sqlite_test_url("backend");
	let backend = DatabaseSessionBackend::new(&url)
		.await
		.expect("Failed to create test backend");
	backend.setup().await.expect("Failed to create schema");
	backend
}

fn record(key: &str) -> SessionRecord {
	let now = Utc::now();
	SessionRecord {
		key: key.to_string(),
		user_id: Some(42),
		data: "encoded-value-bag".to_string(),
		created: now,
		updated: now,
		expires: now + Duration::hours(1),
	}
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_setup_is_idempotent(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	backend.setup().await.expect("second setup succeeds");
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_insert_then_fetch_round_trip(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	let original = record("key-1");
	backend.insert(&original).await.expect("insert");

	let fetched = backend
		.fetch("key-1")
		.await
		.expect("fetch")
		.expect("row present");
	assert_eq!(fetched, original);
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_fetch_unknown_key_is_none(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	assert!(backend.fetch("missing").await.expect("fetch").is_none());
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_insert_conflict(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	backend.insert(&record("key-1")).await.expect("insert");

	let err = backend.insert(&record("key-1")).await.unwrap_err();
	assert!(matches!(err, SessionError::Conflict { key } if key == "key-1"));
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_update_overwrites_row(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	let original = record("key-1");
	backend.insert(&original).await.expect("insert");

	let mut changed = record("key-1");
	changed.user_id = None;
	changed.data = "rewritten".to_string();
	changed.updated = original.updated + Duration::minutes(5);
	backend.update(&changed).await.expect("update");

	let fetched = backend
		.fetch("key-1")
		.await
		.expect("fetch")
		.expect("row present");
	assert_eq!(fetched.user_id, None);
	assert_eq!(fetched.data, "rewritten");
	assert_eq!(fetched.updated, changed.updated);
	// created never changes after insert
	assert_eq!(fetched.created, original.created);
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_update_missing_row_is_noop(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	backend.update(&record("ghost")).await.expect("update");
	assert!(backend.fetch("ghost").await.expect("fetch").is_none());
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_delete_is_idempotent(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;
	backend.insert(&record("key-1")).await.expect("insert");

	backend.delete("key-1").await.expect("first delete");
	backend.delete("key-1").await.expect("second delete");
	assert!(backend.fetch("key-1").await.expect("fetch").is_none());
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_purge_expired_removes_only_lapsed_rows(#[future] backend: DatabaseSessionBackend) {
	let backend = backend.await;

	let mut lapsed = record("lapsed");
	lapsed.expires = Utc::now() - Duration::hours(1);
	backend.insert(&lapsed).await.expect("insert lapsed");
	backend.insert(&record("live")).await.expect("insert live");

	let purged = backend.purge_expired().await.expect("purge");
	assert_eq!(purged, 1);
	assert!(backend.fetch("lapsed").await.expect("fetch").is_none());
	assert!(backend.fetch("live").await.expect("fetch").is_some());
}
