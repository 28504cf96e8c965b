//! Error types for the session layer.
//!
//! [`StoreError`] is returned by every store operation, including the units
//! of work callers hand to the transactional executor. Units of work report
//! business failures through the same type so the executor can classify
//! them without knowing where they came from.

use sqlstore_bus::BusError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Rolling back after a failed unit of work also failed. The session
    /// state is unknown, so this is never retried.
    #[error("rolling back transaction due to error failed: {rollback}: {cause}")]
    Rollback {
        /// The failure that triggered the rollback.
        #[source]
        cause: Box<StoreError>,
        /// The rollback failure.
        rollback: Box<StoreError>,
    },

    /// The caller's deadline passed before a session could be opened.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A command failed validation before touching the database.
    #[error("command validation failed: {0}")]
    Validation(String),

    /// Requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write would duplicate an existing record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Command dispatch failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Internal error (e.g. a request type mismatch).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Combine a unit-of-work failure with the rollback failure it caused.
    pub fn rollback_failed(cause: StoreError, rollback: StoreError) -> Self {
        Self::Rollback {
            cause: Box::new(cause),
            rollback: Box::new(rollback),
        }
    }

    /// The underlying `SQLite` error code, if this is a `SQLite` failure.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::Sqlite(err) => err.sqlite_error_code(),
            _ => None,
        }
    }
}

impl From<StoreError> for BusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Bus(inner) => inner,
            other => BusError::handler(other),
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
