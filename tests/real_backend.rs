// tests/real_backend.rs
//
// Drives the supervisor against real `sh` children. Kept to a single test so
// scripts are never written while another test thread is forking.

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout, SettingsBuilder};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mirrorctl::engine::{Supervisor, SupervisorHandle, SupervisorOptions};
use mirrorctl::exec::TokioProcessBackend;
use mirrorctl::fs::RealFileSystem;
use mirrorctl::settings::keys;
use mirrorctl::sink::LogEntry;
use mirrorctl::types::{RunState, StreamSource};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

type SupervisorTask = tokio::task::JoinHandle<mirrorctl::errors::Result<()>>;

fn launch(script: &Path) -> (SupervisorHandle, SupervisorTask) {
    let store = SettingsBuilder::new()
        .binary(script.to_str().unwrap())
        .set(keys::LINE_BUFFERING, false)
        .store();
    let options = SupervisorOptions {
        escalation_delay: Duration::from_millis(300),
        drain_grace: Duration::from_millis(500),
    };
    let (supervisor, handle) = Supervisor::with_options(
        TokioProcessBackend::new(),
        store,
        Arc::new(RealFileSystem),
        options,
    );
    assert!(handle.status().binary_available);
    (handle, tokio::spawn(supervisor.run()))
}

fn has_entry(handle: &SupervisorHandle, pred: impl Fn(&LogEntry) -> bool) -> bool {
    handle.sink().snapshot().iter().any(pred)
}

async fn wait_for_entry(handle: &SupervisorHandle, pred: impl Fn(&LogEntry) -> bool) {
    with_timeout(async {
        while !has_entry(handle, &pred) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

async fn finish(handle: SupervisorHandle, task: SupervisorTask) {
    handle.shutdown().await.unwrap();
    drop(handle);
    with_timeout(task).await.unwrap().unwrap();
}

#[tokio::test]
async fn real_children_are_captured_stopped_and_killed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let chatty = write_script(dir.path(), "chatty", "echo hello\necho oops >&2\nexit 0");
    let sleeper = write_script(dir.path(), "sleeper", "exec sleep 30");
    let stubborn = write_script(
        dir.path(),
        "stubborn",
        "trap '' TERM\necho ready\nwhile :; do sleep 1; done",
    );

    // Exits on its own: both streams drained, clean status on stdout.
    let (handle, task) = launch(&chatty);
    let mut transitions = handle.transitions();
    handle.start().await.unwrap();
    assert_eq!(with_timeout(transitions.recv()).await.unwrap(), RunState::Starting);
    assert_eq!(with_timeout(transitions.recv()).await.unwrap(), RunState::Running);
    assert_eq!(with_timeout(transitions.recv()).await.unwrap(), RunState::Stopped);
    assert!(has_entry(&handle, |e| e.source == StreamSource::Stdout && e.text == "hello"));
    assert!(has_entry(&handle, |e| e.source == StreamSource::Stderr && e.text == "oops"));
    assert!(has_entry(&handle, |e| {
        e.source == StreamSource::Stdout && e.text.ends_with("exited with status 0.")
    }));
    finish(handle, task).await;

    // Honours the graceful signal.
    let (handle, task) = launch(&sleeper);
    handle.start().await.unwrap();
    with_timeout(handle.wait_for_state(RunState::Running)).await.unwrap();
    handle.stop().await.unwrap();
    let status = with_timeout(handle.wait_for_state(RunState::Stopped)).await.unwrap();
    assert_eq!(status.pid, None);
    assert!(has_entry(&handle, |e| e.text.ends_with("exited with status 15.")));
    finish(handle, task).await;

    // Ignores the graceful signal and gets killed.
    let (handle, task) = launch(&stubborn);
    handle.start().await.unwrap();
    wait_for_entry(&handle, |e| e.text == "ready").await;
    handle.stop().await.unwrap();
    with_timeout(handle.wait_for_state(RunState::Stopped)).await.unwrap();
    assert!(has_entry(&handle, |e| {
        e.source == StreamSource::Stdout && e.text.ends_with("exited with status 9.")
    }));
    finish(handle, task).await;
}
