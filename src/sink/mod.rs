// src/sink/mod.rs

//! Bounded log of backend output.
//!
//! The sink keeps no copy of its own: the rendered lines live in the
//! settings store under [`keys::LOGS`], so every observer of the store sees
//! the same log. Each append is a single atomic read-modify-write of that
//! list which also enforces the `max-log-lines` bound. The list is edited in
//! place and appends never touch the disk; a [`FileStore`] persists them
//! later from its writer task.
//!
//! [`FileStore`]: crate::settings::FileStore

pub mod entry;

use std::sync::Arc;

use tracing::{trace, warn};

use crate::settings::{keys, SettingValue, Settings, SettingsStore};
use crate::types::StreamSource;

pub use entry::LogEntry;

#[derive(Debug, Clone)]
pub struct LogSink {
    store: Arc<dyn SettingsStore>,
}

impl LogSink {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Append a line tagged with `source`, evicting the oldest lines while
    /// the list exceeds `max-log-lines` (no bound when that is `<= 0`).
    ///
    /// Store failures are logged and swallowed.
    pub fn append(&self, line: impl Into<String>, source: StreamSource) {
        self.append_entry(LogEntry::now(source, line));
    }

    pub fn append_entry(&self, entry: LogEntry) {
        let rendered = entry.render();
        trace!(line = %rendered, "appending log entry");

        let mut pending = Some(rendered);
        let mut append = |settings: &Settings, value: &mut SettingValue| {
            let max_lines = settings.int(keys::MAX_LOG_LINES);
            match (value, pending.take()) {
                (SettingValue::StrList(lines), Some(line)) => {
                    lines.push(line);
                    enforce_bound(lines, max_lines);
                    true
                }
                _ => false,
            }
        };
        let result = self.store.update(keys::LOGS, &mut append);

        if let Err(err) = result {
            warn!(error = %err, "failed to append log entry");
        }
    }

    /// Entries in insertion order. Lines that do not parse are skipped.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lines()
            .iter()
            .filter_map(|line| LogEntry::parse(line))
            .collect()
    }

    /// Rendered lines in insertion order, as exported to observers.
    pub fn lines(&self) -> Vec<String> {
        match self.store.get(keys::LOGS) {
            Some(SettingValue::StrList(lines)) => lines,
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.set(keys::LOGS, SettingValue::StrList(Vec::new())) {
            warn!(error = %err, "failed to clear log");
        }
    }
}

/// Drop lines from the front until `lines.len() <= max_lines`.
fn enforce_bound(lines: &mut Vec<String>, max_lines: i64) {
    if max_lines <= 0 {
        return;
    }
    let max = usize::try_from(max_lines).unwrap_or(usize::MAX);
    if lines.len() > max {
        let excess = lines.len() - max;
        lines.drain(..excess);
    }
}
