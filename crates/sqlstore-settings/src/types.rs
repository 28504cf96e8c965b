//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Path value that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/app/store.db", "busyTimeoutMs": 5000 },
///   "transaction": { "maxRetries": 3 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Connection and pool settings.
    pub database: DatabaseSettings,
    /// Transaction retry settings.
    pub transaction: TransactionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl StoreSettings {
    /// Reject values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".into(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "database.path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// `SQLite` connection pool settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. Relative paths resolve against the settings directory;
    /// `:memory:` selects an in-memory database.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `PRAGMA busy_timeout` applied to every connection, in milliseconds.
    pub busy_timeout_ms: u32,
    /// `PRAGMA cache_size` in KiB.
    pub cache_size_kib: i64,
    /// How long to wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "sqlstore.db".to_string(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
            connection_timeout_ms: 5_000,
        }
    }
}

impl DatabaseSettings {
    /// Whether the configured path selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }

    /// Resolve the database path against `base_dir` if it is relative.
    pub fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() || self.is_in_memory() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

/// Lock-contention retry settings for transactional sessions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionSettings {
    /// Retries after the first attempt when the database reports it is
    /// locked or busy.
    pub max_retries: u32,
    /// Pause before each retry, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 10,
        }
    }
}

impl TransactionSettings {
    /// Pause before each retry.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let settings = StoreSettings::default();
        assert_eq!(settings.database.pool_size, 16);
        assert_eq!(settings.database.busy_timeout_ms, 30_000);
        assert_eq!(settings.database.cache_size_kib, 8192);
        assert_eq!(settings.transaction.max_retries, 5);
        assert_eq!(settings.transaction.retry_delay(), Duration::from_millis(10));
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(StoreSettings::default()).unwrap();
        assert_eq!(json["database"]["busyTimeoutMs"], 30_000);
        assert_eq!(json["transaction"]["retryDelayMs"], 10);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: StoreSettings =
            serde_json::from_str(r#"{"transaction": {"maxRetries": 2}}"#).unwrap();
        assert_eq!(settings.transaction.max_retries, 2);
        assert_eq!(settings.transaction.retry_delay_ms, 10);
        assert_eq!(settings.database.pool_size, 16);
    }

    #[test]
    fn zero_pool_size_rejected() {
        let mut settings = StoreSettings::default();
        settings.database.pool_size = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn resolve_relative_and_absolute_paths() {
        let base = Path::new("/srv/app");
        let mut db = DatabaseSettings::default();
        assert_eq!(db.resolve_path(base), PathBuf::from("/srv/app/sqlstore.db"));

        db.path = "/data/other.db".into();
        assert_eq!(db.resolve_path(base), PathBuf::from("/data/other.db"));

        db.path = IN_MEMORY_PATH.into();
        assert!(db.is_in_memory());
        assert_eq!(db.resolve_path(base), PathBuf::from(":memory:"));
    }
}
