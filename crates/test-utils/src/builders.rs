#![allow(dead_code)]

use std::sync::Arc;

use mirrorctl::settings::{keys, MemoryStore, SettingValue, Settings, SettingsStore};

/// Builder for a settings table / in-memory store to simplify test setup.
///
/// Values go through the store's validation, so an invalid value fails the
/// test at build time.
pub struct SettingsBuilder {
    values: Vec<(String, SettingValue)>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn set(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.values.push((key.to_string(), value.into()));
        self
    }

    pub fn binary(self, binary: &str) -> Self {
        self.set(keys::BINARY, binary)
    }

    pub fn server_name(self, name: &str) -> Self {
        self.set(keys::SERVER_NAME, name)
    }

    pub fn fullscreen(self, on: bool) -> Self {
        self.set(keys::FULLSCREEN, on)
    }

    pub fn max_log_lines(self, max: i64) -> Self {
        self.set(keys::MAX_LOG_LINES, max)
    }

    pub fn config_file(self, path: &std::path::Path) -> Self {
        self.set(keys::LAUNCH_STRATEGY, "config-file")
            .set(keys::CONFIG_FILE_PATH, path.display().to_string())
    }

    pub fn store(self) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for (key, value) in self.values {
            store
                .set(&key, value)
                .unwrap_or_else(|err| panic!("invalid test setting '{key}': {err}"));
        }
        Arc::new(store)
    }

    pub fn build(self) -> Settings {
        self.store().snapshot()
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
