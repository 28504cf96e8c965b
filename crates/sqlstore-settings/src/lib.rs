//! # sqlstore-settings
//!
//! Configuration for the `sqlstore` session layer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StoreSettings::default()`]
//! 2. **Settings file**: `~/.sqlstore/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `SQLSTORE_*` overrides (highest priority)
//!
//! There is no global instance: load once at startup and pass the value
//! to whatever needs it.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{DatabaseSettings, LoggingSettings, StoreSettings, TransactionSettings};
