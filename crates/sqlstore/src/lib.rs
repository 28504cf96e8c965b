//! # sqlstore
//!
//! Transactional session layer over `SQLite`.
//!
//! - **Sessions**: [`DbSession`] owns one pooled connection and the events
//!   queued for publication once its transaction commits
//! - **Session manager**: [`SqlStore::resolve_or_create`] reuses the session
//!   bound to a [`Context`] or opens a new one
//! - **Transactional executor**: [`SqlStore::run_in_transaction`] wraps a
//!   unit of work in `BEGIN`/`COMMIT`, rolls back on failure, retries lock
//!   contention and publishes queued events in order after commit
//! - **Dialect**: [`Dialect`] classifies driver errors (lock contention,
//!   unique violations)
//! - **Handlers**: stars and playlists, registered on a
//!   [`HandlerRegistry`](sqlstore_bus::HandlerRegistry)

#![deny(unsafe_code)]

pub mod connection;
pub mod context;
pub mod dialect;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod schema;
pub mod session;
pub mod store;
pub mod transactions;

#[cfg(test)]
mod test_support;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use context::Context;
pub use dialect::{Dialect, SqliteDialect};
pub use errors::{Result, StoreError};
pub use session::DbSession;
pub use sqlstore_bus::{Event, Publisher};
pub use store::{SessionRef, SqlStore};
