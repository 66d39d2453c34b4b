// src/launch/options.rs

//! Option table: how each setting turns into backend marker tokens.
//!
//! Rules are applied in table order, so the resulting directive list (and
//! therefore the argument vector and the config artifact) is stable for a
//! given settings table.

use crate::settings::{keys, SettingValue, Settings};
use crate::settings::schema::{DEFAULT_AUDIO_LATENCY, DEFAULT_INITIAL_VOLUME, DEFAULT_RESET_TIMEOUT};

/// One marker token with its optional value.
///
/// Tokens are stored bare (`fs`, `n`); argument vectors prefix them with `-`,
/// config artifact lines do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub token: &'static str,
    pub value: Option<String>,
}

impl Directive {
    pub fn flag(token: &'static str) -> Self {
        Self { token, value: None }
    }

    pub fn with_value(token: &'static str, value: impl Into<String>) -> Self {
        Self {
            token,
            value: Some(value.into()),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![format!("-{}", self.token)];
        if let Some(ref value) = self.value {
            args.push(value.clone());
        }
        args
    }

    pub fn to_line(&self) -> String {
        match self.value {
            Some(ref value) => format!("{} {}", self.token, value),
            None => self.token.to_string(),
        }
    }
}

/// When a value-carrying option counts as "set".
#[derive(Debug, Clone, Copy)]
pub enum ValueDefault {
    /// Emit when the string is non-empty.
    NonEmpty,
    /// Emit when the integer differs from this default.
    Int(i64),
    /// Emit when the double differs from this default.
    Double(f64),
}

/// Value attached to a choice entry.
#[derive(Debug, Clone, Copy)]
pub enum ChoiceValue {
    None,
    Literal(&'static str),
    /// Read the value from another (string) setting. When that setting is
    /// empty the whole directive is dropped if `required`, otherwise the
    /// token is emitted alone.
    FromKey { key: &'static str, required: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct ChoiceEntry {
    pub token: Option<&'static str>,
    pub value: ChoiceValue,
}

impl ChoiceEntry {
    pub const NONE: ChoiceEntry = ChoiceEntry {
        token: None,
        value: ChoiceValue::None,
    };
}

#[derive(Debug, Clone, Copy)]
pub enum Encoding {
    /// Boolean emitted only when true.
    Flag { token: &'static str },
    /// Value emitted with its token only when non-empty / non-default.
    /// `template` wraps the rendered value (`{}` is the placeholder).
    Value {
        token: &'static str,
        default: ValueDefault,
        template: Option<&'static str>,
    },
    /// String value emitted only while the boolean `gate` setting is true.
    Gated { token: &'static str, gate: &'static str },
    /// Integer index into `entries`; out-of-range falls back to `fallback`.
    Choice {
        entries: &'static [ChoiceEntry],
        fallback: ChoiceEntry,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct OptionRule {
    pub key: &'static str,
    pub encoding: Encoding,
}

const SECURITY_MODES: &[ChoiceEntry] = &[
    ChoiceEntry::NONE,
    ChoiceEntry {
        token: Some("pin"),
        value: ChoiceValue::FromKey {
            key: keys::PIN_CODE,
            required: false,
        },
    },
    ChoiceEntry {
        token: Some("pw"),
        value: ChoiceValue::FromKey {
            key: keys::PASSWORD,
            required: true,
        },
    },
];

const RESOLUTION_PRESETS: &[ChoiceEntry] = &[
    ChoiceEntry {
        token: Some("s"),
        value: ChoiceValue::Literal("1920x1080@60"),
    },
    ChoiceEntry {
        token: Some("s"),
        value: ChoiceValue::Literal("3840x2160@60"),
    },
    ChoiceEntry {
        token: Some("s"),
        value: ChoiceValue::Literal("1280x720@60"),
    },
];

pub const OPTION_TABLE: &[OptionRule] = &[
    OptionRule {
        key: keys::SERVER_NAME,
        encoding: Encoding::Value {
            token: "n",
            default: ValueDefault::NonEmpty,
            template: None,
        },
    },
    OptionRule {
        key: keys::NO_HOSTNAME,
        encoding: Encoding::Flag { token: "nh" },
    },
    OptionRule {
        key: keys::H265,
        encoding: Encoding::Flag { token: "h265" },
    },
    OptionRule {
        key: keys::SECURITY_MODE,
        encoding: Encoding::Choice {
            entries: SECURITY_MODES,
            fallback: ChoiceEntry::NONE,
        },
    },
    OptionRule {
        key: keys::RESOLUTION_PRESET,
        encoding: Encoding::Choice {
            entries: RESOLUTION_PRESETS,
            fallback: ChoiceEntry {
                token: Some("s"),
                value: ChoiceValue::FromKey {
                    key: keys::CUSTOM_RESOLUTION,
                    required: true,
                },
            },
        },
    },
    OptionRule {
        key: keys::FULLSCREEN,
        encoding: Encoding::Flag { token: "fs" },
    },
    OptionRule {
        key: keys::VSYNC,
        encoding: Encoding::Flag { token: "vsync" },
    },
    OptionRule {
        key: keys::AUDIO_LATENCY,
        encoding: Encoding::Value {
            token: "al",
            default: ValueDefault::Double(DEFAULT_AUDIO_LATENCY),
            template: None,
        },
    },
    OptionRule {
        key: keys::INITIAL_VOLUME,
        encoding: Encoding::Value {
            token: "as",
            default: ValueDefault::Double(DEFAULT_INITIAL_VOLUME),
            template: Some("pulsesink volume={}"),
        },
    },
    OptionRule {
        key: keys::PORT_CONFIG,
        encoding: Encoding::Gated {
            token: "p",
            gate: keys::USE_CUSTOM_PORTS,
        },
    },
    OptionRule {
        key: keys::RESET_TIMEOUT,
        encoding: Encoding::Value {
            token: "reset",
            default: ValueDefault::Int(DEFAULT_RESET_TIMEOUT),
            template: None,
        },
    },
    OptionRule {
        key: keys::DEBUG,
        encoding: Encoding::Flag { token: "d" },
    },
];

/// Apply every rule of [`OPTION_TABLE`] to `settings`.
pub fn directives(settings: &Settings) -> Vec<Directive> {
    OPTION_TABLE
        .iter()
        .filter_map(|rule| apply_rule(rule, settings))
        .collect()
}

fn apply_rule(rule: &OptionRule, settings: &Settings) -> Option<Directive> {
    match rule.encoding {
        Encoding::Flag { token } => settings.boolean(rule.key).then(|| Directive::flag(token)),
        Encoding::Value {
            token,
            default,
            template,
        } => {
            let rendered = render_if_set(settings.get(rule.key)?, default)?;
            let value = match template {
                Some(t) => t.replace("{}", &rendered),
                None => rendered,
            };
            Some(Directive::with_value(token, value))
        }
        Encoding::Gated { token, gate } => {
            if !settings.boolean(gate) {
                return None;
            }
            let value = settings.string(rule.key);
            if value.is_empty() {
                Some(Directive::flag(token))
            } else {
                Some(Directive::with_value(token, value))
            }
        }
        Encoding::Choice { entries, fallback } => {
            let index = settings.int(rule.key);
            let entry = usize::try_from(index)
                .ok()
                .and_then(|i| entries.get(i))
                .copied()
                .unwrap_or(fallback);
            resolve_choice(entry, settings)
        }
    }
}

fn render_if_set(value: &SettingValue, default: ValueDefault) -> Option<String> {
    match (value, default) {
        (SettingValue::Str(s), ValueDefault::NonEmpty) if !s.is_empty() => Some(s.clone()),
        (SettingValue::Int(i), ValueDefault::Int(d)) if *i != d => Some(i.to_string()),
        (SettingValue::Double(v), ValueDefault::Double(d)) if (*v - d).abs() > f64::EPSILON => {
            Some(v.to_string())
        }
        _ => None,
    }
}

fn resolve_choice(entry: ChoiceEntry, settings: &Settings) -> Option<Directive> {
    let token = entry.token?;
    match entry.value {
        ChoiceValue::None => Some(Directive::flag(token)),
        ChoiceValue::Literal(value) => Some(Directive::with_value(token, value)),
        ChoiceValue::FromKey { key, required } => {
            let value = settings.string(key);
            match (value.is_empty(), required) {
                (false, _) => Some(Directive::with_value(token, value)),
                (true, true) => None,
                (true, false) => Some(Directive::flag(token)),
            }
        }
    }
}
