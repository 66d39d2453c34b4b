// tests/escalation.rs

mod common;
use crate::common::{with_timeout, FakeBackend, Harness, SettingsBuilder};

use std::error::Error;
use std::time::Duration;

use mirrorctl::exec::ExitReport;
use mirrorctl::types::{RunState, StreamSource};

type TestResult = Result<(), Box<dyn Error>>;

async fn running_harness(backend: FakeBackend) -> Result<Harness, Box<dyn Error>> {
    let h = Harness::new(SettingsBuilder::new(), backend);
    h.handle.start().await?;
    with_timeout(h.handle.wait_for_state(RunState::Running)).await?;
    Ok(h)
}

#[tokio::test(start_paused = true)]
async fn stubborn_process_is_killed_after_the_escalation_delay() -> TestResult {
    let backend = FakeBackend::new();
    backend.hang_on_terminate(true);
    let h = running_harness(backend).await?;
    let process = h.backend.last_process().expect("spawned");
    let mut transitions = h.handle.transitions();

    h.handle.stop().await?;
    assert_eq!(with_timeout(transitions.recv()).await?, RunState::Stopping);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(process.terminate_count(), 1);
    assert_eq!(process.kill_count(), 0);
    assert_eq!(h.handle.status().run_state, RunState::Stopping);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(with_timeout(transitions.recv()).await?, RunState::Stopped);
    assert_eq!(process.kill_count(), 1);
    assert!(h.logged(
        StreamSource::Stdout,
        &format!("uxplay process (PID: {}) exited with status 9.", process.pid())
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(process.kill_count(), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn prompt_exit_cancels_the_pending_kill() -> TestResult {
    let h = running_harness(FakeBackend::new()).await?;
    let process = h.backend.last_process().expect("spawned");

    h.handle.stop().await?;
    with_timeout(h.handle.wait_for_state(RunState::Stopped)).await?;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(process.terminate_count(), 1);
    assert_eq!(process.kill_count(), 0);

    let texts: Vec<String> = h.entries().into_iter().map(|e| e.text).collect();
    let attempt = texts
        .iter()
        .position(|t| t == "Attempting to stop uxplay process.")
        .expect("stop attempt logged");
    let exited = texts
        .iter()
        .position(|t| t.ends_with("exited with status 15."))
        .expect("exit logged");
    assert!(attempt < exited);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_stop_requests_send_one_terminate() -> TestResult {
    let backend = FakeBackend::new();
    backend.hang_on_terminate(true);
    let h = running_harness(backend).await?;
    let process = h.backend.last_process().expect("spawned");

    h.handle.stop().await?;
    h.handle.stop().await?;
    h.handle.stop().await?;
    with_timeout(h.handle.wait_for_state(RunState::Stopped)).await?;

    assert_eq!(process.terminate_count(), 1);
    assert_eq!(process.kill_count(), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_after_escalation_gets_a_fresh_timer() -> TestResult {
    let backend = FakeBackend::new();
    backend.hang_on_terminate(true);
    let h = running_harness(backend).await?;
    let first = h.backend.last_process().expect("spawned");

    h.handle.stop().await?;
    with_timeout(h.handle.wait_for_state(RunState::Stopped)).await?;
    assert_eq!(first.kill_count(), 1);

    h.backend.hang_on_terminate(false);
    h.handle.start().await?;
    with_timeout(h.handle.wait_for_state(RunState::Running)).await?;
    let second = h.backend.wait_for_spawns(2).await;
    assert_ne!(first.pid(), second.pid());

    h.handle.stop().await?;
    with_timeout(h.handle.wait_for_state(RunState::Stopped)).await?;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(second.terminate_count(), 1);
    assert_eq!(second.kill_count(), 0);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_running_sends_only_the_graceful_signal() -> TestResult {
    let backend = FakeBackend::new();
    backend.hang_on_terminate(true);
    let h = running_harness(backend).await?;
    let process = h.backend.last_process().expect("spawned");
    let sink = h.handle.sink().clone();

    h.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(process.terminate_count(), 1);
    assert_eq!(process.kill_count(), 0);
    let texts: Vec<String> = sink.snapshot().into_iter().map(|e| e.text).collect();
    assert!(texts.contains(&"Supervisor is shutting down, stopping uxplay process.".to_string()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_signals_leave_the_stop_pending_until_exit() -> TestResult {
    let backend = FakeBackend::new();
    backend.fail_signals(true);
    let h = running_harness(backend).await?;
    let process = h.backend.last_process().expect("spawned");
    let mut transitions = h.handle.transitions();

    h.handle.stop().await?;
    assert_eq!(with_timeout(transitions.recv()).await?, RunState::Stopping);
    assert_eq!(process.terminate_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.handle.status().run_state, RunState::Stopping);
    assert_eq!(process.kill_count(), 0);

    // The forceful signal is still attempted, and also rejected.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(process.kill_count(), 1);
    assert!(!process.has_exited());
    assert_eq!(h.handle.status().run_state, RunState::Stopping);

    process.exit(ExitReport::Clean);
    assert_eq!(with_timeout(transitions.recv()).await?, RunState::Stopped);
    assert_eq!(h.handle.status().pid, None);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(process.terminate_count(), 1);
    assert_eq!(process.kill_count(), 1);

    h.shutdown().await;
    Ok(())
}
