// src/sink/entry.rs

use std::fmt;

use chrono::Local;

use crate::types::StreamSource;

/// Wall-clock format used for log timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One captured line: `[timestamp] SOURCE: text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub source: StreamSource,
    pub text: String,
}

impl LogEntry {
    /// Stamp `text` with the current local time.
    pub fn now(source: StreamSource, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            source,
            text: text.into(),
        }
    }

    /// Parse a rendered line back into an entry.
    ///
    /// Returns `None` for lines that were not produced by [`LogEntry::render`].
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (timestamp, rest) = rest.split_once("] ")?;

        let (source, text) = if let Some(text) = rest.strip_prefix("STDOUT: ") {
            (StreamSource::Stdout, text)
        } else if let Some(text) = rest.strip_prefix("STDERR: ") {
            (StreamSource::Stderr, text)
        } else {
            return None;
        };

        Some(Self {
            timestamp: timestamp.to_string(),
            source,
            text: text.to_string(),
        })
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.source.label(), self.text)
    }
}
