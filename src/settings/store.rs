// src/settings/store.rs

//! Settings store abstraction.
//!
//! The store is the single source of truth for options *and* for the
//! captured backend log (see [`crate::sink`]). Every mutation is applied
//! under one lock, so read-modify-write updates from several stream readers
//! never interleave.

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::{MirrorError, Result};
use crate::settings::model::{SettingValue, Settings};
use crate::settings::schema::lookup;
use crate::settings::validate::check_update;

/// Flat key → typed value store with per-key change notification.
pub trait SettingsStore: Send + Sync + Debug {
    /// Copy of all current values.
    fn snapshot(&self) -> Settings;

    /// Current value of `key` (schema default when unset).
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// Replace the value of `key`.
    fn set(&self, key: &str, value: SettingValue) -> Result<()>;

    /// Atomically read-modify-write `key`.
    ///
    /// The closure sees the full table (read-only) and the stored value of
    /// `key` (mutable, edited in place) and returns whether it changed
    /// anything. Nothing is notified when it returns `false`.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&Settings, &mut SettingValue) -> bool,
    ) -> Result<()>;

    /// Receive the key name of every subsequent change.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Shared state behind both store implementations.
#[derive(Debug)]
pub(crate) struct StoreState {
    settings: Mutex<Settings>,
    changes: broadcast::Sender<String>,
}

impl StoreState {
    pub(crate) fn new(settings: Settings) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            settings: Mutex::new(settings),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    pub(crate) fn get(&self, key: &str) -> Option<SettingValue> {
        self.lock().value_or_default(key)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    /// Validate `value` and store it. Returns whether the stored value
    /// changed.
    pub(crate) fn replace(&self, key: &str, value: SettingValue) -> Result<bool> {
        let mut value = Some(check_update(key, value)?);
        self.mutate(key, &mut |_: &Settings, slot: &mut SettingValue| match value.take() {
            Some(v) if *slot != v => {
                *slot = v;
                true
            }
            _ => false,
        })
    }

    /// Apply `f` to the stored value of `key` without copying it. Returns
    /// whether anything changed.
    ///
    /// A value left invalid by `f` is replaced by the schema default and the
    /// validation error returned.
    pub(crate) fn mutate(
        &self,
        key: &str,
        f: &mut dyn FnMut(&Settings, &mut SettingValue) -> bool,
    ) -> Result<bool> {
        let mut settings = self.lock();

        let mut value = settings
            .take(key)
            .ok_or_else(|| MirrorError::Settings(format!("unknown setting '{key}'")))?;
        if !f(&*settings, &mut value) {
            settings.insert_checked(key, value);
            return Ok(false);
        }

        match check_update(key, value) {
            Ok(value) => {
                settings.insert_checked(key, value);
            }
            Err(err) => {
                if let Some(default) = lookup(key) {
                    settings.insert_checked(key, default.to_value());
                }
                return Err(err);
            }
        }

        drop(settings);
        debug!(key, "setting changed");
        // No receivers is fine.
        let _ = self.changes.send(key.to_string());
        Ok(true)
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug)]
pub struct MemoryStore {
    state: StoreState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            state: StoreState::new(settings),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    fn snapshot(&self) -> Settings {
        self.state.snapshot()
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.state.get(key)
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<()> {
        self.state.replace(key, value).map(|_| ())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&Settings, &mut SettingValue) -> bool,
    ) -> Result<()> {
        self.state.mutate(key, f).map(|_| ())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.state.subscribe()
    }
}
