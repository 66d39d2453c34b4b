// src/settings/validate.rs

use tracing::warn;

use crate::errors::{MirrorError, Result};
use crate::settings::model::{RawSettings, SettingKind, SettingValue, Settings};
use crate::settings::schema::{keys, lookup};
use crate::types::LaunchStrategy;

impl TryFrom<RawSettings> for Settings {
    type Error = MirrorError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        let mut settings = Settings::default();
        for (key, value) in raw.values {
            let value = check_update(&key, value)?;
            settings.insert_checked(&key, value);
        }
        Ok(settings)
    }
}

/// Check `value` against the schema kind of `key`.
///
/// Integers are widened for double-typed keys. Unknown keys are kept as-is
/// (with a warning) so files written by newer versions still load.
pub fn check_value(key: &str, value: SettingValue) -> Result<SettingValue> {
    let Some(default) = lookup(key) else {
        warn!(key, "unknown setting; keeping value as-is");
        return Ok(value);
    };

    match (default.kind(), value) {
        (SettingKind::Double, SettingValue::Int(i)) => Ok(SettingValue::Double(i as f64)),
        (expected, value) if value.kind() == expected => Ok(value),
        (expected, value) => Err(MirrorError::Settings(format!(
            "setting '{key}' must be a {expected}, got a {}",
            value.kind()
        ))),
    }
}

/// Check `value` for `key` both by kind and by the per-key rules.
pub fn check_update(key: &str, value: SettingValue) -> Result<SettingValue> {
    let value = check_value(key, value)?;
    validate_entry(key, &value)?;
    Ok(value)
}

fn validate_entry(key: &str, value: &SettingValue) -> Result<()> {
    let SettingValue::Str(text) = value else {
        return Ok(());
    };

    match key {
        keys::PIN_CODE => validate_pin_code(text),
        keys::LAUNCH_STRATEGY => text
            .parse::<LaunchStrategy>()
            .map(|_| ())
            .map_err(MirrorError::Settings),
        keys::BINARY if text.trim().is_empty() => Err(MirrorError::Settings(format!(
            "'{}' must name the backend executable",
            keys::BINARY
        ))),
        _ => Ok(()),
    }
}

fn validate_pin_code(pin: &str) -> Result<()> {
    if pin.is_empty() {
        return Ok(());
    }
    if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(MirrorError::Settings(format!(
            "'{}' must be exactly 4 digits (got \"{pin}\")",
            keys::PIN_CODE
        )));
    }
    Ok(())
}

/// Parse a `KEY=VALUE` override from the command line into a typed value,
/// using the schema kind of `key` to decide how to read `raw`.
pub fn parse_value(key: &str, raw: &str) -> Result<SettingValue> {
    let kind = lookup(key)
        .map(|d| d.kind())
        .ok_or_else(|| MirrorError::Settings(format!("unknown setting '{key}'")))?;

    let bad = |what: &str| {
        MirrorError::Settings(format!("setting '{key}' expects {what}, got \"{raw}\""))
    };

    let value = match kind {
        SettingKind::Bool => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => SettingValue::Bool(true),
            "false" | "no" | "off" | "0" => SettingValue::Bool(false),
            _ => return Err(bad("a boolean")),
        },
        SettingKind::Int => SettingValue::Int(raw.trim().parse().map_err(|_| bad("an integer"))?),
        SettingKind::Double => {
            SettingValue::Double(raw.trim().parse().map_err(|_| bad("a number"))?)
        }
        SettingKind::Str => SettingValue::Str(raw.to_string()),
        SettingKind::StrList => SettingValue::StrList(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    };

    check_update(key, value)
}
