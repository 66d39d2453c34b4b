// src/settings/file_store.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::settings::model::{RawSettings, SettingValue, Settings};
use crate::settings::store::{SettingsStore, StoreState};

/// Settings persisted as a TOML file.
///
/// `set` writes the file before returning, so a failed write reaches the
/// caller. `update` (used for every captured log line) only marks the table
/// dirty; the task started by [`FileStore::spawn_writer`] coalesces those
/// changes into one write at a time on the blocking pool. Whatever is still
/// dirty is written by [`FileStore::flush`] and on drop.
#[derive(Debug)]
pub struct FileStore {
    state: StoreState,
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    pending: Arc<PendingWrite>,
}

#[derive(Debug, Default)]
struct PendingWrite {
    dirty: AtomicBool,
    wake: Notify,
    // Serializes writes so an older snapshot never lands after a newer one.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`. A missing file yields schema defaults; the
    /// file is created on the first change.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = load_from_path(fs.as_ref(), &path)?;
        Ok(Self {
            state: StoreState::new(settings),
            fs,
            path,
            pending: Arc::new(PendingWrite::default()),
        })
    }

    /// Start the background writer. It ends once the store is dropped.
    pub fn spawn_writer(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let pending = self.pending.clone();

        tokio::spawn(async move {
            loop {
                pending.wake.notified().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                match tokio::task::spawn_blocking(move || store.flush()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "failed to write settings file"),
                    Err(err) => warn!(error = %err, "settings writer task failed"),
                }
            }
            debug!("settings writer stopped");
        })
    }

    /// Write the table if it changed since the last successful write.
    pub fn flush(&self) -> Result<()> {
        let _guard = self
            .pending
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.pending.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let settings = self.state.snapshot();
        if let Err(err) = self.persist(&settings) {
            self.pending.dirty.store(true, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }

    fn mark_dirty(&self) {
        self.pending.dirty.store(true, Ordering::SeqCst);
    }

    fn persist(&self, settings: &Settings) -> Result<()> {
        let text = toml::to_string_pretty(settings)?;
        self.fs.write(&self.path, text.as_bytes())?;
        debug!(path = %self.path.display(), bytes = text.len(), "wrote settings file");
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(error = %err, "failed to write settings file on close");
        }
        // Let the writer notice the store is gone.
        self.pending.wake.notify_one();
    }
}

/// Read and validate a settings file.
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<Settings> {
    if !fs.exists(path) {
        info!(path = %path.display(), "settings file not found; using defaults");
        return Ok(Settings::default());
    }

    let contents = fs.read_to_string(path)?;
    let raw: RawSettings = toml::from_str(&contents)?;
    debug!(path = %path.display(), keys = raw.values.len(), "loaded settings file");
    Settings::try_from(raw)
}

impl SettingsStore for FileStore {
    fn snapshot(&self) -> Settings {
        self.state.snapshot()
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.state.get(key)
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<()> {
        if self.state.replace(key, value)? {
            self.mark_dirty();
            self.flush()?;
        }
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&Settings, &mut SettingValue) -> bool,
    ) -> Result<()> {
        if self.state.mutate(key, f)? {
            self.mark_dirty();
            self.pending.wake.notify_one();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.state.subscribe()
    }
}
