// src/settings/mod.rs

//! Typed settings: schema, validation and the stores that hold them.
//!
//! - [`schema`] lists every known key with its default.
//! - [`model`] holds the value types and the validated `Settings` table.
//! - [`validate`] checks raw values against the schema.
//! - [`store`] defines the `SettingsStore` trait and an in-memory store.
//! - [`file_store`] persists the table as TOML.

pub mod file_store;
pub mod model;
pub mod schema;
pub mod store;
pub mod validate;

use std::path::PathBuf;

pub use file_store::FileStore;
pub use model::{RawSettings, SettingKind, SettingValue, Settings};
pub use schema::keys;
pub use store::{MemoryStore, SettingsStore};

/// Directory holding mirrorctl's per-user files.
///
/// `<user config dir>/mirrorctl`, falling back to `./.mirrorctl` when the
/// platform has no config directory.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("mirrorctl"))
        .unwrap_or_else(|| PathBuf::from(".mirrorctl"))
}

/// Default location of the settings file.
pub fn default_settings_path() -> PathBuf {
    user_config_dir().join("settings.toml")
}
