// src/lib.rs

pub mod cli;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod launch;
pub mod logging;
pub mod settings;
pub mod sink;
pub mod status;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::engine::{Supervisor, SupervisorHandle};
use crate::exec::TokioProcessBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::settings::validate::parse_value;
use crate::settings::{FileStore, Settings, SettingsStore};
use crate::sink::LogSink;
use crate::types::RunState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (and `--set` overrides)
/// - the maintenance commands (`--dry-run`, `--print-logs`, `--clear-logs`)
/// - supervisor + process backend
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(settings::default_settings_path);

    let store = Arc::new(
        FileStore::open(fs.clone(), &settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?,
    );
    apply_overrides(store.as_ref(), &args.overrides)?;

    let sink = LogSink::new(store.clone());
    if args.clear_logs {
        sink.clear();
        info!("captured log cleared");
    }
    if args.print_logs {
        for line in sink.lines() {
            println!("{line}");
        }
    }
    if args.dry_run {
        print_dry_run(&settings_path, &store.snapshot());
    }
    if args.is_maintenance() {
        return Ok(());
    }

    supervise(store, fs).await
}

/// Apply `--set KEY=VALUE` pairs, persisting each one.
fn apply_overrides(store: &dyn SettingsStore, overrides: &[(String, String)]) -> Result<()> {
    for (key, raw) in overrides {
        let value = parse_value(key, raw).with_context(|| format!("invalid value for '{key}'"))?;
        store
            .set(key, value)
            .with_context(|| format!("updating setting '{key}'"))?;
        debug!(%key, %raw, "setting overridden from command line");
    }
    Ok(())
}

/// Start the backend and keep it running until Ctrl-C or until it exits on
/// its own; then stop it (with escalation) and shut the supervisor down.
async fn supervise(store: Arc<FileStore>, fs: Arc<dyn FileSystem>) -> Result<()> {
    let binary = store.snapshot().string(settings::keys::BINARY).to_string();
    let (supervisor, handle) = Supervisor::new(TokioProcessBackend::new(), store.clone(), fs);
    if !handle.status().binary_available {
        bail!("backend binary '{binary}' was not found on PATH");
    }

    // Captured lines only mark the settings dirty; this task writes them out.
    let writer = store.spawn_writer();

    let task = tokio::spawn(supervisor.run());
    let started = start_and_confirm(&handle).await;

    if started? {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listening for Ctrl-C")?;
                info!("Ctrl-C received; stopping backend");
                handle.stop().await?;
                handle.wait_for_state(RunState::Stopped).await?;
            }
            res = handle.wait_for_state(RunState::Stopped) => {
                res?;
                warn!("backend exited on its own");
            }
        }
    }

    handle.shutdown().await?;
    drop(handle);
    task.await.context("supervisor task panicked")??;

    writer.abort();
    tokio::task::spawn_blocking(move || store.flush())
        .await
        .context("settings writer panicked")?
        .context("writing settings file")?;
    Ok(())
}

/// Request a start and wait until it either reached Running (`true`) or
/// fell back to Stopped (`false`).
async fn start_and_confirm(handle: &SupervisorHandle) -> Result<bool> {
    let mut transitions = handle.transitions();
    handle.start().await?;

    loop {
        match transitions.recv().await {
            Ok(RunState::Running) => return Ok(true),
            Ok(RunState::Stopped) => {
                if let Some(last) = handle.sink().lines().last() {
                    eprintln!("{last}");
                }
                return Ok(false);
            }
            Ok(_) => continue,
            Err(err) => bail!("supervisor stopped reporting status: {err}"),
        }
    }
}

/// Print what a start would do, without touching the filesystem.
fn print_dry_run(settings_path: &Path, settings: &Settings) {
    let materialized = launch::materialize_from_settings(settings);

    println!("mirrorctl dry-run");
    println!("  settings = {}", settings_path.display());
    println!("  launch-strategy = {}", launch::strategy_of(settings));
    println!();
    println!("command:");
    println!("  {}", materialized.spec);

    if let Some(ref artifact) = materialized.artifact {
        println!();
        println!("config file ({}):", artifact.path.display());
        for line in artifact.contents.lines() {
            println!("  {line}");
        }
    }

    debug!("dry-run complete (nothing started)");
}
