//! Unit-of-work session.
//!
//! A [`DbSession`] owns one pooled connection for the lifetime of a logical
//! operation, plus the events that operation wants published once its
//! transaction commits. Dropping the session releases the connection; a
//! transaction still open at that point is rolled back first.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, Params, Row};
use sqlstore_bus::Event;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::PooledConnection;
use crate::dialect::Dialect;
use crate::errors::Result;

/// A unit-of-work handle bound to one pooled connection.
pub struct DbSession {
    id: Uuid,
    conn: PooledConnection,
    events: Vec<Event>,
    dialect: Arc<dyn Dialect>,
}

impl DbSession {
    pub(crate) fn new(conn: PooledConnection, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            id: Uuid::now_v7(),
            conn,
            events: Vec::new(),
            dialect,
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying connection, for repositories that take `&Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// The dialect this session classifies errors with.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transaction control
    // ─────────────────────────────────────────────────────────────────────

    /// Issue `BEGIN`.
    pub fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        debug!(session = %self.id, "transaction started");
        Ok(())
    }

    /// Issue `COMMIT`.
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        debug!(session = %self.id, "transaction committed");
        Ok(())
    }

    /// Issue `ROLLBACK` and discard every pending event.
    pub fn rollback(&mut self) -> Result<()> {
        let discarded = self.events.len();
        self.events.clear();
        self.conn.execute_batch("ROLLBACK")?;
        debug!(session = %self.id, discarded, "transaction rolled back");
        Ok(())
    }

    /// Whether a transaction is open on this session's connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    /// Execute a statement, returning the number of rows affected.
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Run a query expected to return exactly one row.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(sql, params, f)?)
    }

    /// Run a query returning at most one row.
    pub fn query_opt<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(sql, params, f).optional()?)
    }

    /// Run a query and map every row.
    pub fn query_map<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, f)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a row into `table` and return its generated id.
    ///
    /// Runs the dialect's insert-id hooks around the statement.
    pub fn insert_id<P: Params>(&self, table: &str, sql: &str, params: P) -> Result<i64> {
        self.dialect.pre_insert_id(table, &self.conn)?;
        let _ = self.conn.execute(sql, params)?;
        let id = self.conn.last_insert_rowid();
        self.dialect.post_insert_id(table, &self.conn)?;
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Post-commit events
    // ─────────────────────────────────────────────────────────────────────

    /// Queue `payload` to be published after the transaction commits.
    ///
    /// Append order is publish order. Nothing queued here is published if
    /// the transaction rolls back.
    pub fn publish_after_commit<T>(&mut self, payload: T)
    where
        T: Any + Send + Sync,
    {
        self.record_event(Event::new(payload));
    }

    /// Queue an already-built event.
    pub fn record_event(&mut self, event: Event) {
        debug!(session = %self.id, event = event.type_name(), "event queued");
        self.events.push(event);
    }

    /// Events queued so far, oldest first.
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl Drop for DbSession {
    fn drop(&mut self) {
        if !self.in_transaction() {
            return;
        }
        warn!(session = %self.id, "session closed with open transaction, rolling back");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(session = %self.id, error = %e, "rollback on close failed");
        }
    }
}

impl fmt::Debug for DbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSession")
            .field("id", &self.id)
            .field("dialect", &self.dialect.driver_name())
            .field("pending_events", &self.events.len())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
