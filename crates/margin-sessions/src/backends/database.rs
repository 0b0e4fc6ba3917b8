//! Relational session backend.
//!
//! Persists one row per session in a `sessions` table, reachable through
//! sqlx's `Any` driver (PostgreSQL in production, SQLite in tests).
//! Timestamps travel as RFC 3339 text.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS sessions (
//!     key TEXT PRIMARY KEY,
//!     user_id BIGINT NULL,
//!     data TEXT NOT NULL,
//!     created TIMESTAMPTZ NOT NULL,
//!     updated TIMESTAMPTZ NOT NULL,
//!     expires TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Alias, ColumnDef, Expr, ExprTrait, Index, Query, SqliteQueryBuilder, Table};
use sqlx::{AnyPool, Row};
use sqlx::any::AnyRow;

use super::{SessionBackend, SessionRecord};
use crate::error::SessionError;

/// Database-backed session storage over a sqlx `Any` pool.
#[derive(Clone)]
pub struct DatabaseSessionBackend {
	pool: Arc<AnyPool>,
}

impl DatabaseSessionBackend {
	/// Connect a new pool to the given database URL.
	///
	/// # Examples
	///
	/// ```rust,no_run
	/// use margin_sessions::backends::DatabaseSessionBackend;
	///
	/// # async fn example() -> Result<(), margin_sessions::error::SessionError> {
	/// let backend = DatabaseSessionBackend::new("postgres://localhost/margin").await?;
	/// # let _ = backend;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn new(database_url: &str) -> Result<Self, SessionError> {
		sqlx::any::install_default_drivers();
		let pool = AnyPool::connect(database_url)
			.await
			.map_err(|e| SessionError::Backend(format!("connection error: {}", e)))?;
		Ok(Self {
			pool: Arc::new(pool),
		})
	}

	/// Create a backend from an existing pool.
	pub fn from_pool(pool: Arc<AnyPool>) -> Self {
		Self { pool }
	}

	/// Delete every row past its `expires` timestamp, returning the count.
	///
	/// This is an explicit maintenance operation; nothing in the store
	/// invokes it automatically.
	pub async fn purge_expired(&self) -> Result<u64, SessionError> {
		let sql = Self::purge_expired_sql();

		let result = sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| SessionError::Backend(format!("failed to purge sessions: {}", e)))?;

		tracing::debug!(purged = result.rows_affected(), "purged expired sessions");
		Ok(result.rows_affected())
	}

	fn record_from_row(row: &AnyRow) -> Result<SessionRecord, SessionError> {
		Ok(SessionRecord {
			key: Self::column(row, "key")?,
			user_id: row
				.try_get::<Option<i64>, _>("user_id")
				.map_err(|e| SessionError::Backend(format!("invalid user_id: {}", e)))?,
			data: Self::column(row, "data")?,
			created: Self::timestamp(row, "created")?,
			updated: Self::timestamp(row, "updated")?,
			expires: Self::timestamp(row, "expires")?,
		})
	}

	fn column(row: &AnyRow, name: &str) -> Result<String, SessionError> {
		row.try_get(name)
			.map_err(|e| SessionError::Backend(format!("invalid {}: {}", name, e)))
	}

	fn timestamp(row: &AnyRow, name: &str) -> Result<DateTime<Utc>, SessionError> {
		let text: String = Self::column(row, name)?;
		DateTime::parse_from_rfc3339(&text)
			.map(|ts| ts.with_timezone(&Utc))
			.map_err(|e| SessionError::Backend(format!("invalid {} timestamp: {}", name, e)))
	}

	// SQL is rendered in synchronous helpers so that the non-`Send`
	// sea-query builder types never live across an `.await` in the async
	// trait methods below.
	fn setup_table_sql() -> String {
		Table::create()
			.table(Alias::new("sessions"))
			.if_not_exists()
			.col(ColumnDef::new(Alias::new("key")).text().not_null().primary_key())
			.col(ColumnDef::new(Alias::new("user_id")).big_integer())
			.col(ColumnDef::new(Alias::new("data")).text().not_null())
			.col(
				ColumnDef::new(Alias::new("created"))
					.timestamp_with_time_zone()
					.not_null(),
			)
			.col(
				ColumnDef::new(Alias::new("updated"))
					.timestamp_with_time_zone()
					.not_null(),
			)
			.col(
				ColumnDef::new(Alias::new("expires"))
					.timestamp_with_time_zone()
					.not_null(),
			)
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn setup_index_sql() -> String {
		Index::create()
			.if_not_exists()
			.name("idx_sessions_expires")
			.table(Alias::new("sessions"))
			.col(Alias::new("expires"))
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn purge_expired_sql() -> String {
		Query::delete()
			.from_table(Alias::new("sessions"))
			.and_where(Expr::col(Alias::new("expires")).lt(Utc::now().to_rfc3339()))
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn insert_sql(record: &SessionRecord) -> String {
		Query::insert()
			.into_table(Alias::new("sessions"))
			.columns([
				Alias::new("key"),
				Alias::new("user_id"),
				Alias::new("data"),
				Alias::new("created"),
				Alias::new("updated"),
				Alias::new("expires"),
			])
			.values(
				[
					Expr::val(record.key.as_str()),
					Expr::val(record.user_id),
					Expr::val(record.data.as_str()),
					Expr::val(record.created.to_rfc3339()),
					Expr::val(record.updated.to_rfc3339()),
					Expr::val(record.expires.to_rfc3339()),
				]
				.into_iter()
				.collect::<Vec<Expr>>(),
			)
			.unwrap()
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn update_sql(record: &SessionRecord) -> String {
		Query::update()
			.table(Alias::new("sessions"))
			.value(Alias::new("user_id"), Expr::val(record.user_id))
			.value(Alias::new("data"), Expr::val(record.data.as_str()))
			.value(Alias::new("updated"), Expr::val(record.updated.to_rfc3339()))
			.value(Alias::new("expires"), Expr::val(record.expires.to_rfc3339()))
			.and_where(Expr::col(Alias::new("key")).eq(record.key.as_str()))
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn delete_sql(key: &str) -> String {
		Query::delete()
			.from_table(Alias::new("sessions"))
			.and_where(Expr::col(Alias::new("key")).eq(key))
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}

	fn fetch_sql(key: &str) -> String {
		Query::select()
			.columns([
				Alias::new("key"),
				Alias::new("user_id"),
				Alias::new("data"),
				Alias::new("created"),
				Alias::new("updated"),
				Alias::new("expires"),
			])
			.from(Alias::new("sessions"))
			.and_where(Expr::col(Alias::new("key")).eq(key))
			.to_owned()
			.to_string(SqliteQueryBuilder)
	}
}

#[async_trait]
impl SessionBackend for DatabaseSessionBackend {
	async fn setup(&self) -> Result<(), SessionError> {
		let sql = Self::setup_table_sql();

		sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| SessionError::Setup(format!("failed to create table: {}", e)))?;

		// Index expires for purge_expired.
		let sql = Self::setup_index_sql();

		sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| SessionError::Setup(format!("failed to create index: {}", e)))?;

		Ok(())
	}

	async fn insert(&self, record: &SessionRecord) -> Result<(), SessionError> {
		let sql = Self::insert_sql(record);

		sqlx::query(&sql).execute(&*self.pool).await.map_err(|e| {
			if let sqlx::Error::Database(db) = &e
				&& db.is_unique_violation()
			{
				return SessionError::Conflict {
					key: record.key.clone(),
				};
			}
			SessionError::Backend(format!("failed to insert session: {}", e))
		})?;

		Ok(())
	}

	async fn update(&self, record: &SessionRecord) -> Result<(), SessionError> {
		let sql = Self::update_sql(record);

		// Zero affected rows is a success: last write wins, missing rows
		// are not resurrected.
		sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| SessionError::Backend(format!("failed to update session: {}", e)))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), SessionError> {
		let sql = Self::delete_sql(key);

		sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| SessionError::Backend(format!("failed to delete session: {}", e)))?;

		Ok(())
	}

	async fn fetch(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
		let sql = Self::fetch_sql(key);

		let row = sqlx::query(&sql)
			.fetch_optional(&*self.pool)
			.await
			.map_err(|e| SessionError::Backend(format!("failed to fetch session: {}", e)))?;

		row.map(|row| Self::record_from_row(&row)).transpose()
	}
}
