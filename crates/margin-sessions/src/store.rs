//! Session store orchestration.
//!
//! [`SessionStore`] bridges the cookie codec and a persistence backend:
//! it resolves a request's cookie into a hydrated [`Session`] and writes
//! mutations back to both the backend row and the response cookie.
//!
//! The store holds no per-session locks. Two concurrent requests that
//! fetch the same identifier, mutate independently, and save will race;
//! the later `update` wins and discards the earlier writer's values.
//! Callers needing stronger guarantees must layer their own versioning.
//!
//! ## Example
//!
//! ```
//! use http::HeaderMap;
//! use margin_sessions::backends::InMemorySessionBackend;
//! use margin_sessions::codec::{CookieCodec, Key};
//! use margin_sessions::config::SessionOptions;
//! use margin_sessions::store::SessionStore;
//!
//! # async fn example() -> Result<(), margin_sessions::error::SessionError> {
//! let codec = CookieCodec::new(vec![Key::new(b"a-signing-secret")])?;
//! let store = SessionStore::new(InMemorySessionBackend::new(), codec, SessionOptions::new(3600));
//! store.initialize().await?;
//!
//! let request_headers = HeaderMap::new();
//! let (mut session, _condition) = store.fetch(&request_headers, "session").await;
//! session.set_user_id(42);
//!
//! let mut response_headers = HeaderMap::new();
//! store.save(&mut response_headers, &mut session).await?;
//! assert!(response_headers.contains_key(http::header::SET_COOKIE));
//! # Ok(())
//! # }
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use http::HeaderMap;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::OnceCell;

use crate::backends::{SessionBackend, SessionRecord};
use crate::codec::CookieCodec;
use crate::config::SessionOptions;
use crate::cookie;
use crate::error::SessionError;
use crate::session::Session;

/// Length in bytes of a freshly generated session identifier.
const KEY_LEN: usize = 32;

/// Orchestrates cookie codec and persistence backend for one process.
///
/// Construction is cheap; [`initialize`](SessionStore::initialize) runs the
/// backend's schema setup exactly once, even when concurrent first requests
/// race, and a setup failure is sticky: the store never becomes usable.
pub struct SessionStore<B> {
	backend: B,
	codec: CookieCodec,
	options: SessionOptions,
	setup: OnceCell<Result<(), String>>,
}

impl<B: SessionBackend> SessionStore<B> {
	/// Create a store over a backend, codec, and default options.
	///
	/// The store's max age is applied to the codec so that cookie
	/// signatures age out together with the sessions they reference.
	pub fn new(backend: B, codec: CookieCodec, options: SessionOptions) -> Self {
		let codec = codec.with_max_age(options.max_age.max(0));
		Self {
			backend,
			codec,
			options,
			setup: OnceCell::new(),
		}
	}

	/// Run the backend's one-time schema setup.
	///
	/// Safe to call from any number of tasks; exactly one performs the
	/// work and everyone observes the same outcome. Every session
	/// operation re-checks this gate, so calling it explicitly at startup
	/// is recommended but not required.
	pub async fn initialize(&self) -> Result<(), SessionError> {
		let outcome = self
			.setup
			.get_or_init(|| async {
				self.backend.setup().await.map_err(|e| match e {
					SessionError::Setup(message) => message,
					other => other.to_string(),
				})
			})
			.await;
		outcome.clone().map_err(SessionError::Setup)
	}

	/// Resolve the request's cookie into a session.
	///
	/// Always yields a usable session. The second element reports how the
	/// session came to be:
	///
	/// - `None` — hydrated from an existing row, or the cookie referenced
	///   a row that no longer exists (deliberately indistinguishable from
	///   a first visit).
	/// - [`SessionError::CookieMissing`] — no cookie; fresh session.
	/// - [`SessionError::Codec`] — cookie or stored data failed
	///   authentication; fresh session. The caller decides whether to
	///   treat the request as anonymous or reject it.
	/// - Other errors — setup or backend failure; fresh session.
	pub async fn fetch(&self, headers: &HeaderMap, name: &str) -> (Session, Option<SessionError>) {
		let mut session = Session::new(name, self.options.clone());

		if let Err(err) = self.initialize().await {
			return (session, Some(err));
		}

		let Some(raw) = cookie::request_cookie(headers, name) else {
			return (
				session,
				Some(SessionError::CookieMissing {
					name: name.to_string(),
				}),
			);
		};

		match self.codec.decode::<String>(name, &raw) {
			Ok(key) => session.id = key,
			Err(err) => {
				tracing::debug!(name, error = %err, "rejected session cookie");
				return (session, Some(err.into()));
			}
		}

		let record = match self.backend.fetch(&session.id).await {
			Ok(record) => record,
			Err(err) => return (session, Some(err)),
		};

		let Some(record) = record else {
			// Valid cookie, vanished row (reaped or backend reset): hand
			// out a fresh session under the same identifier, no error.
			tracing::debug!(name, key = %session.id, "session row gone, starting fresh");
			return (session, None);
		};

		match self.codec.decode(name, &record.data) {
			Ok(values) => {
				session.values = values;
				session.is_new = false;
				(session, None)
			}
			Err(err) => {
				tracing::warn!(name, key = %record.key, error = %err, "stored session data failed authentication");
				(Session::new(name, self.options.clone()), Some(err.into()))
			}
		}
	}

	/// Persist the session and set the response cookie.
	///
	/// A negative max age deletes the backend row and clears the client
	/// cookie instead. The cookie header is written only after the
	/// backend acknowledged the row, so a backend failure never leaves
	/// the client holding a cookie without a row behind it.
	pub async fn save(
		&self,
		headers: &mut HeaderMap,
		session: &mut Session,
	) -> Result<(), SessionError> {
		self.initialize().await?;

		if session.options.max_age < 0 {
			self.backend.delete(session.id()).await?;
			cookie::append_set_cookie(headers, session.name(), "", &session.options)?;
			tracing::debug!(name = session.name(), key = %session.id, "session deleted");
			return Ok(());
		}

		if session.id.is_empty() {
			session.id = generate_key();
		}

		let record = self.record_from_session(session)?;
		if session.is_new() {
			self.backend.insert(&record).await?;
		} else {
			self.backend.update(&record).await?;
		}

		let encoded = self.codec.encode(session.name(), &session.id)?;
		cookie::append_set_cookie(headers, session.name(), &encoded, &session.options)?;
		Ok(())
	}

	/// Derive the durable row from a session's current state.
	///
	/// `created` and `expires` hints in the value bag survive re-saves;
	/// absent hints default to now and now + max age.
	fn record_from_session(&self, session: &Session) -> Result<SessionRecord, SessionError> {
		let data = self.codec.encode(session.name(), &session.values)?;
		let now = Utc::now();
		Ok(SessionRecord {
			key: session.id().to_string(),
			user_id: session.user_id(),
			data,
			created: session.created_hint().unwrap_or(now),
			updated: now,
			expires: session
				.expires_hint()
				.unwrap_or_else(|| now + Duration::seconds(session.options.max_age)),
		})
	}
}

/// Generate a fresh session identifier: 32 bytes from the OS CSPRNG,
/// base64url without padding. Collisions are treated as negligible; an
/// insert conflict propagates instead of being retried.
fn generate_key() -> String {
	let mut bytes = [0u8; KEY_LEN];
	OsRng.fill_bytes(&mut bytes);
	URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generated_keys_are_unique() {
		use std::collections::HashSet;

		let keys: HashSet<String> = (0..10_000).map(|_| generate_key()).collect();
		assert_eq!(keys.len(), 10_000);
	}

	#[test]
	fn test_generated_keys_are_url_safe() {
		let key = generate_key();
		assert!(!key.contains('='));
		assert!(
			key.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		);
	}
}
