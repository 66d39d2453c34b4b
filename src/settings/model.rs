// src/settings/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::schema::{lookup, SCHEMA};

/// A single typed setting value.
///
/// Maps one-to-one onto TOML scalars and string arrays:
///
/// ```toml
/// server-name = "Living Room"
/// fullscreen = true
/// reset-timeout = 30
/// audio-latency = 0.5
/// mirror-logs = ["[2025-01-01 10:00:00] STDOUT: ready"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    StrList(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Int,
    Double,
    Str,
    StrList,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettingKind::Bool => "boolean",
            SettingKind::Int => "integer",
            SettingKind::Double => "double",
            SettingKind::Str => "string",
            SettingKind::StrList => "string list",
        };
        f.write_str(s)
    }
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Double(_) => SettingKind::Double,
            SettingValue::Str(_) => SettingKind::Str,
            SettingValue::StrList(_) => SettingKind::StrList,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Double(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Str(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Str(v)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(v: Vec<String>) -> Self {
        SettingValue::StrList(v)
    }
}

/// Settings exactly as read from disk, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawSettings {
    pub values: BTreeMap<String, SettingValue>,
}

/// Validated flat settings table.
///
/// Every schema key is always present (filled with its default), and every
/// schema key holds a value of the schema's kind. Construct via
/// `Settings::default()` or `Settings::try_from(RawSettings)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Default for Settings {
    fn default() -> Self {
        let values = SCHEMA
            .iter()
            .map(|(key, default)| (key.to_string(), default.to_value()))
            .collect();
        Self { values }
    }
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub(crate) fn insert_checked(&mut self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Move the value of `key` out of the table (schema default when
    /// absent). The caller puts it back with `insert_checked`.
    pub(crate) fn take(&mut self, key: &str) -> Option<SettingValue> {
        self.values
            .remove(key)
            .or_else(|| lookup(key).map(|d| d.to_value()))
    }

    /// Current value of `key`, or its schema default when absent.
    pub fn value_or_default(&self, key: &str) -> Option<SettingValue> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| lookup(key).map(|d| d.to_value()))
    }

    pub fn string(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(SettingValue::Str(s)) => s,
            _ => "",
        }
    }

    pub fn boolean(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(SettingValue::Bool(true)))
    }

    pub fn int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(SettingValue::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn double(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(SettingValue::Double(d)) => *d,
            Some(SettingValue::Int(i)) => *i as f64,
            _ => 0.0,
        }
    }

    pub fn strv(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(SettingValue::StrList(list)) => list,
            _ => &[],
        }
    }
}
