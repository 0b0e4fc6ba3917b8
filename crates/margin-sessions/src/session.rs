//! The in-memory, per-request session value bag.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::SessionOptions;
use crate::error::CodecError;

/// Value-bag key holding the authenticated user's identifier.
pub const USER_ID_KEY: &str = "user_id";
/// Value-bag key hinting the session's original creation time.
pub const CREATED_KEY: &str = "created";
/// Value-bag key hinting the session's expiry time.
pub const EXPIRES_KEY: &str = "expires";

/// One request's session: an identifier, a value bag, and cookie options.
///
/// A session is either freshly minted (`is_new`, no backing row yet) or
/// hydrated from an existing cookie and row. It is mutated only by its
/// request's handler between fetch and save; nothing is shared across
/// requests.
///
/// ## Example
///
/// ```
/// use margin_sessions::config::SessionOptions;
/// use margin_sessions::session::Session;
///
/// let mut session = Session::new("session", SessionOptions::new(3600));
/// assert!(session.is_new());
///
/// session.set_user_id(42);
/// assert_eq!(session.user_id(), Some(42));
/// ```
#[derive(Debug, Clone)]
pub struct Session {
	pub(crate) id: String,
	pub(crate) name: String,
	pub(crate) is_new: bool,
	/// Arbitrary per-session values, JSON-typed.
	pub values: HashMap<String, serde_json::Value>,
	/// This session's cookie options (an independent copy of the store's
	/// defaults).
	pub options: SessionOptions,
}

impl Session {
	/// Create a fresh session with no identifier and an empty value bag.
	pub fn new(name: impl Into<String>, options: SessionOptions) -> Self {
		Self {
			id: String::new(),
			name: name.into(),
			is_new: true,
			values: HashMap::new(),
			options,
		}
	}

	/// The session identifier. Empty until the first save.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The session (and cookie) name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Whether this session has no backing row yet.
	pub fn is_new(&self) -> bool {
		self.is_new
	}

	/// Get a typed value, `None` when absent or of the wrong shape.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.values
			.get(key)
			.and_then(|v| serde_json::from_value(v.clone()).ok())
	}

	/// Set a value.
	pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<(), CodecError> {
		let value = serde_json::to_value(value).map_err(|e| CodecError::Encoding(e.to_string()))?;
		self.values.insert(key.into(), value);
		Ok(())
	}

	/// Remove a value.
	pub fn remove(&mut self, key: &str) {
		self.values.remove(key);
	}

	/// The recognized user identifier, `None` when absent or malformed.
	pub fn user_id(&self) -> Option<i64> {
		self.values.get(USER_ID_KEY).and_then(|v| v.as_i64())
	}

	/// Associate the session with a user.
	pub fn set_user_id(&mut self, user_id: i64) {
		self.values
			.insert(USER_ID_KEY.to_string(), serde_json::json!(user_id));
	}

	/// The `created` hint preserved across re-saves, when present.
	pub fn created_hint(&self) -> Option<DateTime<Utc>> {
		self.get(CREATED_KEY)
	}

	/// The `expires` hint preserved across re-saves, when present.
	pub fn expires_hint(&self) -> Option<DateTime<Utc>> {
		self.get(EXPIRES_KEY)
	}

	/// Mark the session for deletion on the next save.
	pub fn logout(&mut self) {
		self.options.max_age = -1;
	}
}
