//! Full store flow over the relational backend.

use http::HeaderMap;
use http::header::{COOKIE, SET_COOKIE};
use margin_integration_tests::sqlite_test_url;
use margin_sessions::backends::{DatabaseSessionBackend, SessionBackend};
use margin_sessions::codec::{CookieCodec, Key};
use margin_sessions::config::SessionOptions;
use margin_sessions::store::SessionStore;
use rstest::*;
use serial_test::serial;

const NAME: &str = "session";

#[fixture]
async fn store() -> (SessionStore<DatabaseSessionBackend>, DatabaseSessionBackend) {
	let url = sqlite_test_url("store");
	let backend = DatabaseSessionBackend::new(&url)
		.await
		.expect("Failed to create test backend");
	let codec = CookieCodec::new(vec![Key::new(b"integration-secret")]).unwrap();
	let store = SessionStore::new(
		backend.clone(),
		codec,
		SessionOptions::new(3600).with_secure(false),
	);
	store.initialize().await.expect("Failed to initialize store");
	(store, backend)
}

fn set_cookie_value(headers: &HeaderMap) -> String {
	let header = headers
		.get(SET_COOKIE)
		.expect("Set-Cookie present")
		.to_str()
		.unwrap();
	let pair = header.split(';').next().unwrap();
	pair.splitn(2, '=').nth(1).unwrap().to_string()
}

fn request_with_cookie(value: &str) -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.insert(COOKIE, format!("{}={}", NAME, value).parse().unwrap());
	headers
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_round_trip_through_database(
	#[future] store: (SessionStore<DatabaseSessionBackend>, DatabaseSessionBackend),
) {
	let (store, backend) = store.await;

	let (mut session, _) = store.fetch(&HeaderMap::new(), NAME).await;
	assert!(session.is_new());
	session.set_user_id(42);

	let mut response = HeaderMap::new();
	store.save(&mut response, &mut session).await.expect("save");
	let token = set_cookie_value(&response);

	let row = backend
		.fetch(session.id())
		.await
		.expect("fetch row")
		.expect("row present");
	assert_eq!(row.user_id, Some(42));

	let (hydrated, condition) = store.fetch(&request_with_cookie(&token), NAME).await;
	assert!(condition.is_none());
	assert!(!hydrated.is_new());
	assert_eq!(hydrated.user_id(), Some(42));
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_logout_through_database(
	#[future] store: (SessionStore<DatabaseSessionBackend>, DatabaseSessionBackend),
) {
	let (store, backend) = store.await;

	let (mut session, _) = store.fetch(&HeaderMap::new(), NAME).await;
	session.set_user_id(42);
	let mut response = HeaderMap::new();
	store.save(&mut response, &mut session).await.expect("save");
	let token = set_cookie_value(&response);
	let key = session.id().to_string();

	let (mut hydrated, _) = store.fetch(&request_with_cookie(&token), NAME).await;
	hydrated.logout();
	let mut response = HeaderMap::new();
	store
		.save(&mut response, &mut hydrated)
		.await
		.expect("logout save");

	assert!(backend.fetch(&key).await.expect("fetch").is_none());
	let header = response.get(SET_COOKIE).unwrap().to_str().unwrap();
	assert!(header.starts_with(&format!("{}=;", NAME)));
	assert!(header.contains("Max-Age=-1"));

	// The replayed cookie now behaves like a first visit.
	let (fresh, condition) = store.fetch(&request_with_cookie(&token), NAME).await;
	assert!(fresh.is_new());
	assert!(condition.is_none());
}

#[rstest]
#[tokio::test]
#[serial(sessions_db)]
async fn test_reaped_row_yields_fresh_session(
	#[future] store: (SessionStore<DatabaseSessionBackend>, DatabaseSessionBackend),
) {
	let (store, backend) = store.await;

	let (mut session, _) = store.fetch(&HeaderMap::new(), NAME).await;
	let mut response = HeaderMap::new();
	store.save(&mut response, &mut session).await.expect("save");
	let token = set_cookie_value(&response);

	backend.delete(session.id()).await.expect("reap row");

	let (fresh, condition) = store.fetch(&request_with_cookie(&token), NAME).await;
	assert!(fresh.is_new());
	assert!(condition.is_none());
}
