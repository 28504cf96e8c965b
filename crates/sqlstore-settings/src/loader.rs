//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StoreSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SQLSTORE_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::StoreSettings;

/// Resolve the default settings file (`~/.sqlstore/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sqlstore").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StoreSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StoreSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<StoreSettings> {
    let defaults = serde_json::to_value(StoreSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SQLSTORE_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut StoreSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are logged and
/// ignored (the file/default value stays).
pub fn apply_overrides<F>(settings: &mut StoreSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Database ────────────────────────────────────────────────────
    if let Some(v) = read("SQLSTORE_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read_ranged(&read, "SQLSTORE_POOL_SIZE", 1, 1024) {
        settings.database.pool_size = v;
    }
    if let Some(v) = read_ranged(&read, "SQLSTORE_BUSY_TIMEOUT_MS", 0, 600_000) {
        settings.database.busy_timeout_ms = v;
    }
    if let Some(v) = read_ranged(&read, "SQLSTORE_CACHE_SIZE_KIB", 0, 4_194_304) {
        settings.database.cache_size_kib = v;
    }

    // ── Transactions ────────────────────────────────────────────────
    if let Some(v) = read_ranged(&read, "SQLSTORE_MAX_RETRIES", 0, 100) {
        settings.transaction.max_retries = v;
    }
    if let Some(v) = read_ranged(&read, "SQLSTORE_RETRY_DELAY_MS", 0, 60_000) {
        settings.transaction.retry_delay_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("SQLSTORE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as an integer within `[min, max]`.
pub fn parse_ranged<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_ranged<T, R>(read: &R, name: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
    R: Fn(&str) -> Option<String>,
{
    let val = read(name)?;
    let result = parse_ranged(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid numeric env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"database": {"poolSize": 16, "path": "a.db"}});
        let source = serde_json::json!({"database": {"poolSize": 4}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["database"]["poolSize"], 4);
        assert_eq!(merged["database"]["path"], "a.db");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = read_file_layer(path).unwrap();
        assert_eq!(settings, StoreSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"busyTimeoutMs": 0}, "transaction": {"retryDelayMs": 1}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.database.busy_timeout_ms, 0);
        assert_eq!(settings.database.pool_size, 16);
        assert_eq!(settings.transaction.retry_delay_ms, 1);
        assert_eq!(settings.transaction.max_retries, 5);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": {"poolSize": 0}}"#).unwrap();

        // The env layer can't rescue a zero pool size unless SQLSTORE_POOL_SIZE is set.
        let mut settings = read_file_layer(&path).unwrap();
        apply_overrides(&mut settings, env(&[]));
        assert!(matches!(
            settings.validate().unwrap_err(),
            SettingsError::InvalidValue(_)
        ));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = StoreSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("SQLSTORE_DB_PATH", ":memory:"),
                ("SQLSTORE_POOL_SIZE", "2"),
                ("SQLSTORE_MAX_RETRIES", "3"),
                ("SQLSTORE_RETRY_DELAY_MS", "25"),
                ("SQLSTORE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.database.path, ":memory:");
        assert_eq!(settings.database.pool_size, 2);
        assert_eq!(settings.transaction.max_retries, 3);
        assert_eq!(settings.transaction.retry_delay_ms, 25);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut settings = StoreSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("SQLSTORE_POOL_SIZE", "0"),
                ("SQLSTORE_MAX_RETRIES", "lots"),
                ("SQLSTORE_DB_PATH", ""),
            ]),
        );
        assert_eq!(settings, StoreSettings::default());
    }

    // ── parse_ranged ────────────────────────────────────────────────

    #[test]
    fn parse_ranged_bounds() {
        assert_eq!(parse_ranged::<u32>("5", 0, 10), Some(5));
        assert_eq!(parse_ranged::<u32>(" 10 ", 0, 10), Some(10));
        assert_eq!(parse_ranged::<u32>("11", 0, 10), None);
        assert_eq!(parse_ranged::<u64>("-1", 0, 10), None);
        assert_eq!(parse_ranged::<i64>("abc", 0, 10), None);
    }
}
