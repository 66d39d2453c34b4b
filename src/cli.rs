// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `mirrorctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mirrorctl",
    version,
    about = "Run a screen-mirroring backend, capture its output and stop it safely.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// Default: `settings.toml` in the per-user mirrorctl config directory.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Change a setting before doing anything else (repeatable).
    ///
    /// The new value is written back to the settings file.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    /// Print the launch command (and config file, if used) without starting
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the captured backend log and exit.
    #[arg(long)]
    pub print_logs: bool,

    /// Clear the captured backend log and exit.
    #[arg(long)]
    pub clear_logs: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MIRRORCTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Whether the invocation only inspects or edits stored state.
    pub fn is_maintenance(&self) -> bool {
        self.dry_run || self.print_logs || self.clear_logs
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
