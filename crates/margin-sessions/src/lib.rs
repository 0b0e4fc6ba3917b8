//! # Margin Sessions
//!
//! Cookie-backed, database-persisted sessions for the Margin server.
//!
//! A [`SessionStore`] turns an opaque, authenticated browser cookie into a
//! server-held [`Session`] value bag and back:
//!
//! - [`codec`] — authenticated (optionally encrypted) encoding between
//!   values and cookie text, with an ordered key list for rotation
//! - [`backends`] — durable storage of one row per session behind the
//!   [`SessionBackend`] trait (relational via sqlx, or in-memory)
//! - [`store`] — the lifecycle orchestration: fetch, save, logout
//!
//! ## Quick Start
//!
//! ```
//! use http::HeaderMap;
//! use margin_sessions::{CookieCodec, InMemorySessionBackend, Key, SessionOptions, SessionStore};
//!
//! # async fn example() -> Result<(), margin_sessions::SessionError> {
//! let codec = CookieCodec::new(vec![Key::new(b"a-signing-secret")])?;
//! let store = SessionStore::new(
//!     InMemorySessionBackend::new(),
//!     codec,
//!     SessionOptions::new(60 * 60 * 24 * 30),
//! );
//! store.initialize().await?;
//!
//! // First request: no cookie, fresh anonymous session.
//! let (mut session, _condition) = store.fetch(&HeaderMap::new(), "session").await;
//! assert!(session.is_new());
//!
//! // Sign the caller in and persist.
//! session.set_user_id(42);
//! let mut response = HeaderMap::new();
//! store.save(&mut response, &mut session).await?;
//!
//! // Sign out: delete the row, clear the cookie.
//! session.logout();
//! store.save(&mut response, &mut session).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod codec;
pub mod config;
mod cookie;
pub mod error;
pub mod session;
pub mod store;

pub use backends::{DatabaseSessionBackend, InMemorySessionBackend, SessionBackend, SessionRecord};
pub use codec::{CookieCodec, Key};
pub use config::{SameSite, SessionOptions};
pub use error::{CodecError, SessionError};
pub use session::Session;
pub use store::SessionStore;
