//! Driver-specific error classification.
//!
//! The transactional executor only asks one question of a failed unit of
//! work: is this lock contention? Each backing store answers it through a
//! [`Dialect`], which keeps the retry logic store-agnostic.

use std::fmt::Debug;

use rusqlite::{Connection, ErrorCode, ffi};

use crate::errors::{Result, StoreError};

/// Per-driver behaviour the session layer depends on.
pub trait Dialect: Send + Sync + Debug {
    /// Driver name, for logs.
    fn driver_name(&self) -> &'static str;

    /// Whether `err` means the database was locked or busy, i.e. the unit
    /// of work can safely be run again from the top.
    fn is_lock_contention(&self, err: &StoreError) -> bool;

    /// Whether `err` is a unique or primary-key constraint violation.
    fn is_unique_violation(&self, err: &StoreError) -> bool;

    /// Hook run before an insert whose generated id the caller wants back.
    fn pre_insert_id(&self, _table: &str, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    /// Hook run after such an insert.
    fn post_insert_id(&self, _table: &str, _conn: &Connection) -> Result<()> {
        Ok(())
    }
}

/// `SQLite` dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn driver_name(&self) -> &'static str {
        "sqlite3"
    }

    fn is_lock_contention(&self, err: &StoreError) -> bool {
        matches!(
            err.sqlite_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    fn is_unique_violation(&self, err: &StoreError) -> bool {
        match err {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::ConstraintViolation
                    && matches!(
                        e.extended_code,
                        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    )
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: std::os::raw::c_int) -> StoreError {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(ffi::Error::new(code), None))
    }

    #[test]
    fn busy_and_locked_are_contention() {
        let dialect = SqliteDialect;
        assert!(dialect.is_lock_contention(&failure(ffi::SQLITE_BUSY)));
        assert!(dialect.is_lock_contention(&failure(ffi::SQLITE_LOCKED)));
        assert!(dialect.is_lock_contention(&failure(ffi::SQLITE_BUSY_SNAPSHOT)));
    }

    #[test]
    fn other_errors_are_not_contention() {
        let dialect = SqliteDialect;
        assert!(!dialect.is_lock_contention(&failure(ffi::SQLITE_CONSTRAINT_UNIQUE)));
        assert!(!dialect.is_lock_contention(&StoreError::Validation("x".into())));
        assert!(!dialect.is_lock_contention(&StoreError::Sqlite(
            rusqlite::Error::QueryReturnedNoRows
        )));
    }

    #[test]
    fn unique_violation_from_real_insert() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE)")
            .unwrap();
        let _ = conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();
        let err = StoreError::from(
            conn.execute("INSERT INTO t (name) VALUES ('a')", [])
                .unwrap_err(),
        );

        let dialect = SqliteDialect;
        assert!(dialect.is_unique_violation(&err));
        assert!(!dialect.is_lock_contention(&err));
    }

    #[test]
    fn insert_id_hooks_default_to_noop() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteDialect.pre_insert_id("star", &conn).is_ok());
        assert!(SqliteDialect.post_insert_id("star", &conn).is_ok());
        assert_eq!(SqliteDialect.driver_name(), "sqlite3");
    }
}
