//! In-memory session backend.
//!
//! Rows live in a shared map and vanish with the process. Backs the test
//! suite and single-process deployments; the semantics (conflicting
//! insert, no-op update, idempotent delete) mirror the relational backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{SessionBackend, SessionRecord};
use crate::error::SessionError;

/// Session storage in a process-local map.
#[derive(Clone, Default)]
pub struct InMemorySessionBackend {
	records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionBackend {
	/// Create an empty backend.
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of stored rows.
	pub fn len(&self) -> usize {
		let records = self.records.read().unwrap_or_else(|e| e.into_inner());
		records.len()
	}

	/// Whether the backend holds no rows.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
	async fn setup(&self) -> Result<(), SessionError> {
		Ok(())
	}

	async fn insert(&self, record: &SessionRecord) -> Result<(), SessionError> {
		let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
		if records.contains_key(&record.key) {
			return Err(SessionError::Conflict {
				key: record.key.clone(),
			});
		}
		records.insert(record.key.clone(), record.clone());
		Ok(())
	}

	async fn update(&self, record: &SessionRecord) -> Result<(), SessionError> {
		let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
		if let Some(existing) = records.get_mut(&record.key) {
			existing.user_id = record.user_id;
			existing.data = record.data.clone();
			existing.updated = record.updated;
			existing.expires = record.expires;
		}
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), SessionError> {
		let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
		records.remove(key);
		Ok(())
	}

	async fn fetch(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
		let records = self.records.read().unwrap_or_else(|e| e.into_inner());
		Ok(records.get(key).cloned())
	}
}
