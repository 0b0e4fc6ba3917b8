//! Pluggable durable storage for sessions.
//!
//! One row per session, keyed by the session identifier. The relational
//! implementation in [`database`] is the production variant; [`memory`]
//! backs tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SessionError;

pub mod database;
pub mod memory;

pub use database::DatabaseSessionBackend;
pub use memory::InMemorySessionBackend;

/// A durable session row.
///
/// `data` is always the codec's authenticated encoding of the session's
/// value bag at the time of the last save; it is never written partially.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
	/// Session identifier (primary key).
	pub key: String,
	/// Associated user identifier; `None` when the session is anonymous.
	pub user_id: Option<i64>,
	/// Authenticated encoding of the session's value bag.
	pub data: String,
	/// When the session was first created.
	pub created: DateTime<Utc>,
	/// When the row was last written.
	pub updated: DateTime<Utc>,
	/// When the session lapses.
	pub expires: DateTime<Utc>,
}

/// Durable session storage keyed by session identifier.
///
/// Every operation blocks (awaits) until the underlying store has
/// acknowledged it; dropping the future cancels the in-flight operation.
#[async_trait]
pub trait SessionBackend: Send + Sync {
	/// Create the backing schema if absent. Idempotent; invoked only
	/// through the store's one-time setup gate.
	async fn setup(&self) -> Result<(), SessionError>;

	/// Insert a new row. Fails with [`SessionError::Conflict`] when the
	/// key already exists.
	async fn insert(&self, record: &SessionRecord) -> Result<(), SessionError>;

	/// Overwrite an existing row. Last write wins; succeeds as a no-op
	/// when no row matches.
	async fn update(&self, record: &SessionRecord) -> Result<(), SessionError>;

	/// Delete a row. Succeeds even when no row exists.
	async fn delete(&self, key: &str) -> Result<(), SessionError>;

	/// Fetch a row, `None` when the key is unknown.
	async fn fetch(&self, key: &str) -> Result<Option<SessionRecord>, SessionError>;
}
