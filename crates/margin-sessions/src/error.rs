//! Error taxonomy for the session store.
//!
//! Two layers: [`CodecError`] for everything that can go wrong while turning
//! values into cookie text and back, and [`SessionError`] for the store and
//! backend surface. The store propagates every failure except the
//! missing-row case on fetch, which deliberately collapses into a fresh
//! session (see [`crate::store::SessionStore::fetch`]).

use thiserror::Error;

/// Cookie codec errors
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
	/// The value could not be serialized into a cookie payload.
	#[error("failed to encode cookie value: {0}")]
	Encoding(String),
	/// The authentication tag is missing, malformed, or does not verify
	/// under any configured key.
	#[error("cookie authentication failed")]
	Signature,
	/// The tag verified but was issued longer ago than the configured
	/// max age allows.
	#[error("cookie signature has expired")]
	Expired,
	/// Key material handed to the codec is unusable.
	#[error("invalid codec key material: {0}")]
	Config(String),
}

/// Session store errors
///
/// Handlers map these onto HTTP status codes; the store itself never logs
/// as control flow and never terminates the process.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
	/// No cookie of the requested name was present. Non-fatal: the
	/// accompanying session is a fresh anonymous one.
	#[error("no cookie named {name:?} on the request")]
	CookieMissing { name: String },
	/// Cookie or stored data blob failed authenticated decoding.
	#[error(transparent)]
	Codec(#[from] CodecError),
	/// Insert hit an existing row for the same identifier. Propagated,
	/// never silently retried.
	#[error("session {key:?} already exists")]
	Conflict { key: String },
	/// Connectivity or query failure in the persistence backend.
	#[error("session backend error: {0}")]
	Backend(String),
	/// Schema initialization failed; the store never becomes usable.
	#[error("session store setup failed: {0}")]
	Setup(String),
}

impl SessionError {
	/// Whether this condition still yields a usable anonymous session.
	///
	/// # Examples
	///
	/// ```
	/// use margin_sessions::error::SessionError;
	///
	/// let err = SessionError::CookieMissing { name: "session".into() };
	/// assert!(err.is_benign());
	/// ```
	pub fn is_benign(&self) -> bool {
		matches!(self, SessionError::CookieMissing { .. })
	}
}
