// src/engine/transitions.rs

//! Transition logic for the supervisor core.
//!
//! Every handler takes the current [`CoreState`], moves it to the next
//! state and returns the commands the shell must execute, in order.

use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::core::CoreState;
use crate::exec::ExitReport;
use crate::types::{RunState, StreamSource};

/// Command produced by the pure core, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Materialize the launch spec and spawn the child; the shell answers
    /// with `SpawnSucceeded` or `SpawnFailed`.
    Spawn,
    /// Start draining the new child's stdout and stderr.
    AttachReaders,
    /// Start waiting for the new child's exit.
    WatchExit,
    /// Stop both readers immediately.
    CancelReaders,
    /// Let both readers reach EOF (bounded by the drain grace), then stop
    /// them.
    DrainReaders,
    SendGraceful { pid: u32 },
    SendForceful { pid: u32 },
    ArmEscalation { ticket: u64, delay: Duration },
    DisarmEscalation,
    /// Drop the process handle and exit watcher.
    ReleaseHandle,
    /// Append an entry to the captured log.
    Log { source: StreamSource, text: String },
}

/// Decision returned by the core after handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<SupervisorCommand>,
    /// Whether the supervisor loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn run(commands: Vec<SupervisorCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn idle() -> Self {
        Self::run(Vec::new())
    }
}

fn log(source: StreamSource, text: String) -> SupervisorCommand {
    SupervisorCommand::Log { source, text }
}

pub fn handle_start(state: &mut CoreState) -> CoreStep {
    match state.run_state {
        RunState::Stopped => {
            state.run_state = RunState::Starting;
            CoreStep::run(vec![SupervisorCommand::Spawn])
        }
        RunState::Unavailable => {
            debug!(binary = %state.binary, "start ignored: backend binary unavailable");
            CoreStep::idle()
        }
        other => {
            debug!(state = %other, "start ignored: process already active");
            CoreStep::idle()
        }
    }
}

pub fn handle_spawn_succeeded(state: &mut CoreState, pid: u32, binary: String) -> CoreStep {
    if state.run_state != RunState::Starting {
        warn!(pid, state = %state.run_state, "spawn result outside Starting; releasing it");
        return CoreStep::run(vec![SupervisorCommand::ReleaseHandle]);
    }

    state.run_state = RunState::Running;
    state.pid = Some(pid);
    state.binary = binary;

    CoreStep::run(vec![
        SupervisorCommand::AttachReaders,
        SupervisorCommand::WatchExit,
        log(
            StreamSource::Stdout,
            format!("{} process started (PID: {pid}).", state.binary),
        ),
    ])
}

pub fn handle_spawn_failed(state: &mut CoreState, binary: String, error: String) -> CoreStep {
    if state.run_state != RunState::Starting {
        return CoreStep::idle();
    }

    state.run_state = RunState::Stopped;
    state.pid = None;
    state.binary = binary;

    CoreStep::run(vec![log(
        StreamSource::Stderr,
        format!("Failed to initialize {} process: {error}", state.binary),
    )])
}

/// The graceful half of a stop; shared by stop and shutdown.
fn begin_stop(state: &mut CoreState, pid: u32) -> Vec<SupervisorCommand> {
    let ticket = state.next_ticket;
    state.next_ticket += 1;
    state.escalation = Some(ticket);
    state.forceful_sent = false;
    state.run_state = RunState::Stopping;

    vec![
        log(
            StreamSource::Stdout,
            format!("Attempting to stop {} process.", state.binary),
        ),
        SupervisorCommand::CancelReaders,
        SupervisorCommand::SendGraceful { pid },
        SupervisorCommand::ArmEscalation {
            ticket,
            delay: state.escalation_delay,
        },
    ]
}

pub fn handle_stop(state: &mut CoreState) -> CoreStep {
    match (state.run_state, state.pid) {
        (RunState::Running, Some(pid)) => CoreStep::run(begin_stop(state, pid)),
        (RunState::Stopping, _) => {
            debug!("stop ignored: already stopping");
            CoreStep::idle()
        }
        (other, _) => {
            debug!(state = %other, "stop ignored: no running process");
            CoreStep::idle()
        }
    }
}

pub fn handle_escalation(state: &mut CoreState, ticket: u64) -> CoreStep {
    if state.escalation != Some(ticket) {
        debug!(ticket, "stale escalation timer ignored");
        return CoreStep::idle();
    }
    state.escalation = None;

    match (state.run_state, state.pid) {
        (RunState::Stopping, Some(pid)) if !state.forceful_sent => {
            warn!(
                pid,
                delay = ?state.escalation_delay,
                "{} did not terminate in time; sending SIGKILL",
                state.binary
            );
            state.forceful_sent = true;
            CoreStep::run(vec![SupervisorCommand::SendForceful { pid }])
        }
        _ => CoreStep::idle(),
    }
}

pub fn handle_exit(state: &mut CoreState, pid: u32, report: ExitReport) -> CoreStep {
    if state.pid != Some(pid) {
        debug!(pid, current = ?state.pid, "exit of unknown process ignored");
        return CoreStep::idle();
    }

    let mut commands = Vec::new();
    match state.run_state {
        RunState::Running => commands.push(SupervisorCommand::DrainReaders),
        RunState::Stopping => {
            if state.escalation.take().is_some() {
                commands.push(SupervisorCommand::DisarmEscalation);
            }
        }
        _ => {}
    }
    commands.push(SupervisorCommand::ReleaseHandle);

    let source = if report.is_expected() {
        StreamSource::Stdout
    } else {
        StreamSource::Stderr
    };
    commands.push(log(
        source,
        format!(
            "{} process (PID: {pid}) exited with status {}.",
            state.binary,
            report.status()
        ),
    ));

    state.run_state = RunState::Stopped;
    state.pid = None;
    state.escalation = None;
    state.forceful_sent = false;

    CoreStep::run(commands)
}

/// Stop a running child without waiting for it, then end the loop.
pub fn handle_shutdown(state: &mut CoreState) -> CoreStep {
    let mut commands = match (state.run_state, state.pid) {
        (RunState::Running, Some(pid)) => {
            let mut commands = vec![log(
                StreamSource::Stdout,
                format!("Supervisor is shutting down, stopping {} process.", state.binary),
            )];
            commands.extend(begin_stop(state, pid));
            commands
        }
        _ => vec![SupervisorCommand::CancelReaders],
    };

    // Nobody is left to act on a late escalation.
    state.escalation = None;
    commands.push(SupervisorCommand::DisarmEscalation);

    CoreStep {
        commands,
        keep_running: false,
    }
}
