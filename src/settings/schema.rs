// src/settings/schema.rs

//! The fixed set of known settings and their defaults.

use super::model::{SettingKind, SettingValue};

/// Setting keys understood by the supervisor and the materializer.
pub mod keys {
    pub const BINARY: &str = "binary";
    pub const LAUNCH_STRATEGY: &str = "launch-strategy";
    pub const LINE_BUFFERING: &str = "line-buffering";
    pub const CONFIG_FILE_PATH: &str = "config-file-path";

    pub const SERVER_NAME: &str = "server-name";
    pub const NO_HOSTNAME: &str = "no-hostname";
    pub const H265: &str = "h265";
    pub const SECURITY_MODE: &str = "security-mode";
    pub const PIN_CODE: &str = "pin-code";
    pub const PASSWORD: &str = "password";
    pub const RESOLUTION_PRESET: &str = "resolution-preset";
    pub const CUSTOM_RESOLUTION: &str = "custom-resolution";
    pub const FULLSCREEN: &str = "fullscreen";
    pub const VSYNC: &str = "vsync";
    pub const AUDIO_LATENCY: &str = "audio-latency";
    pub const INITIAL_VOLUME: &str = "initial-volume";
    pub const USE_CUSTOM_PORTS: &str = "use-custom-ports";
    pub const PORT_CONFIG: &str = "port-config";
    pub const RESET_TIMEOUT: &str = "reset-timeout";
    pub const DEBUG: &str = "debug";

    pub const MAX_LOG_LINES: &str = "max-log-lines";
    pub const LOGS: &str = "mirror-logs";
}

/// Default value of a known setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaDefault {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(&'static str),
    EmptyList,
}

impl SchemaDefault {
    pub fn kind(self) -> SettingKind {
        match self {
            SchemaDefault::Bool(_) => SettingKind::Bool,
            SchemaDefault::Int(_) => SettingKind::Int,
            SchemaDefault::Double(_) => SettingKind::Double,
            SchemaDefault::Str(_) => SettingKind::Str,
            SchemaDefault::EmptyList => SettingKind::StrList,
        }
    }

    pub fn to_value(self) -> SettingValue {
        match self {
            SchemaDefault::Bool(b) => SettingValue::Bool(b),
            SchemaDefault::Int(i) => SettingValue::Int(i),
            SchemaDefault::Double(d) => SettingValue::Double(d),
            SchemaDefault::Str(s) => SettingValue::Str(s.to_string()),
            SchemaDefault::EmptyList => SettingValue::StrList(Vec::new()),
        }
    }
}

pub const DEFAULT_BINARY: &str = "uxplay";
pub const DEFAULT_AUDIO_LATENCY: f64 = 0.25;
pub const DEFAULT_INITIAL_VOLUME: f64 = 1.0;
pub const DEFAULT_RESET_TIMEOUT: i64 = 15;
pub const DEFAULT_MAX_LOG_LINES: i64 = 1000;

pub const SCHEMA: &[(&str, SchemaDefault)] = &[
    (keys::BINARY, SchemaDefault::Str(DEFAULT_BINARY)),
    (keys::LAUNCH_STRATEGY, SchemaDefault::Str("arguments")),
    (keys::LINE_BUFFERING, SchemaDefault::Bool(true)),
    (keys::CONFIG_FILE_PATH, SchemaDefault::Str("")),
    (keys::SERVER_NAME, SchemaDefault::Str("")),
    (keys::NO_HOSTNAME, SchemaDefault::Bool(false)),
    (keys::H265, SchemaDefault::Bool(false)),
    (keys::SECURITY_MODE, SchemaDefault::Int(0)),
    (keys::PIN_CODE, SchemaDefault::Str("")),
    (keys::PASSWORD, SchemaDefault::Str("")),
    (keys::RESOLUTION_PRESET, SchemaDefault::Int(0)),
    (keys::CUSTOM_RESOLUTION, SchemaDefault::Str("")),
    (keys::FULLSCREEN, SchemaDefault::Bool(false)),
    (keys::VSYNC, SchemaDefault::Bool(false)),
    (keys::AUDIO_LATENCY, SchemaDefault::Double(DEFAULT_AUDIO_LATENCY)),
    (keys::INITIAL_VOLUME, SchemaDefault::Double(DEFAULT_INITIAL_VOLUME)),
    (keys::USE_CUSTOM_PORTS, SchemaDefault::Bool(false)),
    (keys::PORT_CONFIG, SchemaDefault::Str("")),
    (keys::RESET_TIMEOUT, SchemaDefault::Int(DEFAULT_RESET_TIMEOUT)),
    (keys::DEBUG, SchemaDefault::Bool(false)),
    (keys::MAX_LOG_LINES, SchemaDefault::Int(DEFAULT_MAX_LOG_LINES)),
    (keys::LOGS, SchemaDefault::EmptyList),
];

/// Look up the schema default for `key`.
pub fn lookup(key: &str) -> Option<SchemaDefault> {
    SCHEMA
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, default)| *default)
}
