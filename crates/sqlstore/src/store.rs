//! Session manager.
//!
//! [`SqlStore`] owns the connection pool, the dialect and the publishing
//! collaborator. It hands out sessions, reusing the one bound to a
//! [`Context`] when there is one.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use sqlstore_bus::Publisher;
use sqlstore_settings::{StoreSettings, TransactionSettings};
use tracing::{debug, info};

use crate::connection::{self, ConnectionPool};
use crate::context::Context;
use crate::dialect::{Dialect, SqliteDialect};
use crate::errors::Result;
use crate::schema;
use crate::session::DbSession;

/// A session resolved for one call: either opened by this call or borrowed
/// from the caller's context.
#[derive(Debug)]
pub enum SessionRef<'c> {
    /// Opened for this call; closed when dropped.
    Owned(DbSession),
    /// Bound to the caller's context; the caller closes it.
    Borrowed(&'c mut DbSession),
}

impl SessionRef<'_> {
    /// Whether this call opened the session.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl Deref for SessionRef<'_> {
    type Target = DbSession;

    fn deref(&self) -> &DbSession {
        match self {
            Self::Owned(sess) => sess,
            Self::Borrowed(sess) => sess,
        }
    }
}

impl DerefMut for SessionRef<'_> {
    fn deref_mut(&mut self) -> &mut DbSession {
        match self {
            Self::Owned(sess) => sess,
            Self::Borrowed(sess) => sess,
        }
    }
}

/// Pooled `SQLite` store with transactional sessions.
pub struct SqlStore {
    pool: ConnectionPool,
    dialect: Arc<dyn Dialect>,
    publisher: Arc<dyn Publisher>,
    retry: TransactionSettings,
}

impl SqlStore {
    /// Create a store over `pool` with the `SQLite` dialect and default retry
    /// settings.
    pub fn new(pool: ConnectionPool, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            pool,
            dialect: Arc::new(SqliteDialect),
            publisher,
            retry: TransactionSettings::default(),
        }
    }

    /// Open the database described by `settings` and make sure the schema
    /// exists. Relative database paths resolve against `base_dir`.
    pub fn open(
        settings: &StoreSettings,
        base_dir: &Path,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        let pool = connection::from_settings(&settings.database, base_dir)?;
        schema::ensure_schema(&*pool.get()?)?;
        info!(
            path = %settings.database.resolve_path(base_dir).display(),
            pool_size = settings.database.pool_size,
            "store opened"
        );
        Ok(Self::new(pool, publisher).with_retry(settings.transaction.clone()))
    }

    /// Replace the dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Replace the lock-contention retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: TransactionSettings) -> Self {
        self.retry = retry;
        self
    }

    /// The connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// The dialect used to classify errors.
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// The publishing collaborator.
    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Lock-contention retry settings.
    pub fn retry_settings(&self) -> &TransactionSettings {
        &self.retry
    }

    /// Open a fresh session without starting a transaction.
    pub fn new_session(&self) -> Result<DbSession> {
        let conn = self.pool.get()?;
        Ok(DbSession::new(conn, self.dialect.clone()))
    }

    /// Return the session bound to `ctx`, or open a new one.
    ///
    /// A bound session is returned as-is and `begin_transaction` is ignored.
    /// Otherwise a new session is opened, and `BEGIN` is issued when
    /// `begin_transaction` is set; a failure there is returned and the
    /// session is closed.
    pub fn resolve_or_create<'c>(
        &self,
        ctx: &'c mut Context<'_>,
        begin_transaction: bool,
    ) -> Result<SessionRef<'c>> {
        if !ctx.has_session() {
            ctx.check_deadline()?;
        }
        if let Some(sess) = ctx.session_mut() {
            debug!(session = %sess.id(), "reusing session bound to context");
            return Ok(SessionRef::Borrowed(sess));
        }

        let mut sess = self.new_session()?;
        if begin_transaction {
            sess.begin()?;
        }
        Ok(SessionRef::Owned(sess))
    }

    /// Run `work` with a session and no transaction of its own.
    ///
    /// For read paths that need a session but not atomicity. A session this
    /// call opens is closed afterwards whatever `work` returns.
    pub fn with_db_session<T, F>(&self, ctx: &mut Context<'_>, work: F) -> Result<T>
    where
        F: FnOnce(&mut DbSession) -> Result<T>,
    {
        let mut sess = self.resolve_or_create(ctx, false)?;
        work(&mut *sess)
    }

    /// Ping the database.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.pool.get()?;
        let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, new_file};
    use crate::errors::StoreError;
    use assert_matches::assert_matches;
    use sqlstore_bus::NoopPublisher;
    use std::time::{Duration, Instant};

    fn store() -> (tempfile::TempDir, SqlStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let config = ConnectionConfig {
            pool_size: 2,
            ..Default::default()
        };
        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        (dir, SqlStore::new(pool, Arc::new(NoopPublisher)))
    }

    #[test]
    fn resolve_creates_owned_session_with_transaction() {
        let (_dir, store) = store();
        let mut ctx = Context::background();
        let sess = store.resolve_or_create(&mut ctx, true).unwrap();
        assert!(sess.is_owned());
        assert!(sess.in_transaction());
    }

    #[test]
    fn resolve_without_transaction() {
        let (_dir, store) = store();
        let mut ctx = Context::background();
        let sess = store.resolve_or_create(&mut ctx, false).unwrap();
        assert!(sess.is_owned());
        assert!(!sess.in_transaction());
    }

    #[test]
    fn resolve_reuses_bound_session() {
        let (_dir, store) = store();
        let mut outer = store.new_session().unwrap();
        let outer_id = outer.id();

        let mut ctx = Context::with_session(&mut outer);
        let sess = store.resolve_or_create(&mut ctx, true).unwrap();
        assert!(!sess.is_owned());
        assert_eq!(sess.id(), outer_id);
        // begin_transaction is ignored for a bound session
        assert!(!sess.in_transaction());
    }

    #[test]
    fn resolve_fails_after_deadline() {
        let (_dir, store) = store();
        let mut ctx = Context::background().with_deadline(Instant::now() - Duration::from_millis(1));
        let err = store.resolve_or_create(&mut ctx, true).unwrap_err();
        assert_matches!(err, StoreError::DeadlineExceeded);
    }

    #[test]
    fn second_begin_on_one_session_fails() {
        let (_dir, store) = store();
        let mut outer = store.new_session().unwrap();
        outer.begin().unwrap();
        // Nested BEGIN on the same connection is an error in SQLite.
        let err = outer.begin().unwrap_err();
        assert_matches!(err, StoreError::Sqlite(_));
    }

    #[test]
    fn resolve_returns_pool_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let config = ConnectionConfig {
            pool_size: 1,
            connection_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        let store = SqlStore::new(pool, Arc::new(NoopPublisher));
        let _held = store.new_session().unwrap();

        let mut ctx = Context::background();
        let err = store.resolve_or_create(&mut ctx, true).unwrap_err();
        assert_matches!(err, StoreError::Pool(_));
    }

    #[test]
    fn with_db_session_closes_session() {
        let (_dir, store) = store();
        let mut ctx = Context::background();
        let total: i64 = store
            .with_db_session(&mut ctx, |sess| sess.query_row("SELECT 41 + 1", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(total, 42);
        assert_eq!(store.pool().state().idle_connections, 2);
    }

    #[test]
    fn with_db_session_propagates_errors() {
        let (_dir, store) = store();
        let mut ctx = Context::background();
        let err = store
            .with_db_session(&mut ctx, |_| -> Result<()> {
                Err(StoreError::NotFound("playlist 9".into()))
            })
            .unwrap_err();
        assert_matches!(err, StoreError::NotFound(_));
        assert_eq!(store.pool().state().idle_connections, 2);
    }

    #[test]
    fn health_check_pings() {
        let (_dir, store) = store();
        store.health_check().unwrap();
    }

    #[test]
    fn open_from_settings_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = StoreSettings::default();
        settings.database.path = "data/app.db".into();
        settings.database.pool_size = 1;
        settings.transaction.max_retries = 2;

        let store = SqlStore::open(&settings, dir.path(), Arc::new(NoopPublisher)).unwrap();
        assert_eq!(store.retry_settings().max_retries, 2);
        let tables: i64 = store
            .pool()
            .get()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'playlist'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
