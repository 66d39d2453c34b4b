#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use mirrorctl::engine::{Supervisor, SupervisorHandle, SupervisorOptions};
use mirrorctl::fs::mock::MockFileSystem;
use mirrorctl::settings::MemoryStore;
use mirrorctl::sink::LogEntry;
use mirrorctl::types::StreamSource;

pub use mirrorctl_test_utils::builders::SettingsBuilder;
pub use mirrorctl_test_utils::{init_tracing, with_timeout, FakeBackend, FakeProcess};

/// A supervisor running on a fake backend, an in-memory store and an
/// in-memory filesystem.
pub struct Harness {
    pub backend: FakeBackend,
    pub store: Arc<MemoryStore>,
    pub fs: MockFileSystem,
    pub handle: SupervisorHandle,
    pub task: JoinHandle<mirrorctl::errors::Result<()>>,
}

impl Harness {
    pub fn new(settings: SettingsBuilder, backend: FakeBackend) -> Self {
        Self::with(settings, backend, MockFileSystem::new(), SupervisorOptions::default())
    }

    pub fn with(
        settings: SettingsBuilder,
        backend: FakeBackend,
        fs: MockFileSystem,
        options: SupervisorOptions,
    ) -> Self {
        init_tracing();
        let store = settings.store();
        let (supervisor, handle) =
            Supervisor::with_options(backend.clone(), store.clone(), Arc::new(fs.clone()), options);
        let task = tokio::spawn(supervisor.run());
        Self {
            backend,
            store,
            fs,
            handle,
            task,
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.handle.sink().snapshot()
    }

    /// Whether an entry from `source` with exactly `text` was captured.
    pub fn logged(&self, source: StreamSource, text: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.source == source && e.text == text)
    }

    /// Poll the captured log until an entry satisfies `pred`.
    pub async fn wait_for_entry(&self, pred: impl Fn(&LogEntry) -> bool) {
        with_timeout(async {
            loop {
                if self.entries().iter().any(&pred) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
    }

    /// Shut the supervisor down and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.handle.shutdown().await;
        drop(self.handle);
        with_timeout(self.task)
            .await
            .expect("supervisor task panicked")
            .expect("supervisor returned an error");
    }
}
