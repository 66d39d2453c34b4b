// src/engine/core.rs

//! Pure supervisor state machine.
//!
//! `SupervisorCore` consumes [`SupervisorEvent`]s and produces:
//! - an updated run state
//! - a list of [`SupervisorCommand`]s for the IO shell
//!
//! It owns no channels, processes or timers, so every transition (including
//! the escalation races) can be unit tested without Tokio.
//!
//! [`SupervisorCommand`]: crate::engine::SupervisorCommand

use std::time::Duration;

use crate::engine::transitions::{
    handle_escalation, handle_exit, handle_shutdown, handle_spawn_failed, handle_spawn_succeeded,
    handle_start, handle_stop, CoreStep,
};
use crate::engine::{SupervisorEvent, SupervisorOptions};
use crate::types::RunState;

/// Mutable state the transition handlers work on.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub(crate) run_state: RunState,
    /// Backend name used in log entries.
    pub(crate) binary: String,
    /// Pid of the live child; `Some` exactly in Running and Stopping.
    pub(crate) pid: Option<u32>,
    /// Ticket of the armed escalation timer, if any.
    pub(crate) escalation: Option<u64>,
    pub(crate) next_ticket: u64,
    /// Forceful terminate already sent in this stop cycle.
    pub(crate) forceful_sent: bool,
    pub(crate) escalation_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct SupervisorCore {
    state: CoreState,
}

impl SupervisorCore {
    /// `binary_available` decides between Stopped and the terminal
    /// Unavailable state.
    pub fn new(
        binary: impl Into<String>,
        binary_available: bool,
        options: SupervisorOptions,
    ) -> Self {
        let run_state = if binary_available {
            RunState::Stopped
        } else {
            RunState::Unavailable
        };
        Self {
            state: CoreState {
                run_state,
                binary: binary.into(),
                pid: None,
                escalation: None,
                next_ticket: 0,
                forceful_sent: false,
                escalation_delay: options.escalation_delay,
            },
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state
    }

    pub fn pid(&self) -> Option<u32> {
        self.state.pid
    }

    pub fn binary(&self) -> &str {
        &self.state.binary
    }

    /// Whether an escalation timer is currently armed.
    pub fn escalation_armed(&self) -> bool {
        self.state.escalation.is_some()
    }

    /// Handle a single event, returning the commands for the IO shell.
    pub fn step(&mut self, event: SupervisorEvent) -> CoreStep {
        let state = &mut self.state;
        match event {
            SupervisorEvent::StartRequested => handle_start(state),
            SupervisorEvent::StopRequested => handle_stop(state),
            SupervisorEvent::SpawnSucceeded { pid, binary } => {
                handle_spawn_succeeded(state, pid, binary)
            }
            SupervisorEvent::SpawnFailed { binary, error } => {
                handle_spawn_failed(state, binary, error)
            }
            SupervisorEvent::ProcessExited { pid, report } => handle_exit(state, pid, report),
            SupervisorEvent::EscalationElapsed { ticket } => handle_escalation(state, ticket),
            SupervisorEvent::ShutdownRequested => handle_shutdown(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SupervisorCommand as Cmd;
    use crate::exec::ExitReport;
    use crate::types::StreamSource;

    fn core() -> SupervisorCore {
        SupervisorCore::new("uxplay", true, SupervisorOptions::default())
    }

    fn running(pid: u32) -> SupervisorCore {
        let mut core = core();
        core.step(SupervisorEvent::StartRequested);
        core.step(SupervisorEvent::SpawnSucceeded {
            pid,
            binary: "uxplay".into(),
        });
        core
    }

    fn armed_ticket(step: &CoreStep) -> u64 {
        step.commands
            .iter()
            .find_map(|c| match c {
                Cmd::ArmEscalation { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .expect("escalation armed")
    }

    fn count(step: &CoreStep, pred: impl Fn(&Cmd) -> bool) -> usize {
        step.commands.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn start_only_spawns_from_stopped() {
        let mut core = core();
        let first = core.step(SupervisorEvent::StartRequested);
        assert_eq!(first.commands, [Cmd::Spawn]);
        assert_eq!(core.run_state(), RunState::Starting);

        let second = core.step(SupervisorEvent::StartRequested);
        assert!(second.commands.is_empty());
    }

    #[test]
    fn unavailable_is_terminal() {
        let mut core = SupervisorCore::new("uxplay", false, SupervisorOptions::default());
        assert_eq!(core.run_state(), RunState::Unavailable);
        assert!(core.step(SupervisorEvent::StartRequested).commands.is_empty());
        assert!(core.step(SupervisorEvent::StopRequested).commands.is_empty());
        assert_eq!(core.run_state(), RunState::Unavailable);
    }

    #[test]
    fn spawn_success_attaches_and_logs_pid() {
        let mut core = core();
        core.step(SupervisorEvent::StartRequested);
        let step = core.step(SupervisorEvent::SpawnSucceeded {
            pid: 42,
            binary: "uxplay".into(),
        });

        assert_eq!(core.run_state(), RunState::Running);
        assert_eq!(core.pid(), Some(42));
        assert_eq!(
            step.commands,
            [
                Cmd::AttachReaders,
                Cmd::WatchExit,
                Cmd::Log {
                    source: StreamSource::Stdout,
                    text: "uxplay process started (PID: 42).".into()
                }
            ]
        );
    }

    #[test]
    fn spawn_failure_returns_to_stopped_with_error_entry() {
        let mut core = core();
        core.step(SupervisorEvent::StartRequested);
        let step = core.step(SupervisorEvent::SpawnFailed {
            binary: "uxplay".into(),
            error: "No such file or directory".into(),
        });

        assert_eq!(core.run_state(), RunState::Stopped);
        assert_eq!(core.pid(), None);
        assert!(matches!(
            &step.commands[..],
            [Cmd::Log { source: StreamSource::Stderr, text }] if text.contains("No such file")
        ));
    }

    #[test]
    fn stop_cancels_readers_signals_and_arms_timer() {
        let mut core = running(7);
        let step = core.step(SupervisorEvent::StopRequested);

        assert_eq!(core.run_state(), RunState::Stopping);
        assert_eq!(step.commands[1], Cmd::CancelReaders);
        assert_eq!(step.commands[2], Cmd::SendGraceful { pid: 7 });
        assert!(core.escalation_armed());

        // Second stop is accepted but does nothing.
        assert!(core.step(SupervisorEvent::StopRequested).commands.is_empty());
    }

    #[test]
    fn stop_outside_running_is_noop() {
        let mut core = core();
        assert!(core.step(SupervisorEvent::StopRequested).commands.is_empty());
        assert_eq!(core.run_state(), RunState::Stopped);
    }

    #[test]
    fn exit_before_escalation_disarms_timer_and_ignores_late_firing() {
        let mut core = running(7);
        let ticket = armed_ticket(&core.step(SupervisorEvent::StopRequested));

        let exit = core.step(SupervisorEvent::ProcessExited {
            pid: 7,
            report: ExitReport::Terminated,
        });
        assert_eq!(core.run_state(), RunState::Stopped);
        assert_eq!(core.pid(), None);
        assert_eq!(count(&exit, |c| *c == Cmd::DisarmEscalation), 1);
        assert_eq!(count(&exit, |c| *c == Cmd::ReleaseHandle), 1);

        let late = core.step(SupervisorEvent::EscalationElapsed { ticket });
        assert!(late.commands.is_empty());
    }

    #[test]
    fn hang_escalates_exactly_once() {
        let mut core = running(7);
        let ticket = armed_ticket(&core.step(SupervisorEvent::StopRequested));

        let fired = core.step(SupervisorEvent::EscalationElapsed { ticket });
        assert_eq!(fired.commands, [Cmd::SendForceful { pid: 7 }]);
        assert!(!core.escalation_armed());

        // A duplicate firing of the same ticket does nothing.
        assert!(core
            .step(SupervisorEvent::EscalationElapsed { ticket })
            .commands
            .is_empty());

        let exit = core.step(SupervisorEvent::ProcessExited {
            pid: 7,
            report: ExitReport::Killed,
        });
        assert_eq!(count(&exit, |c| matches!(c, Cmd::ArmEscalation { .. })), 0);
        assert_eq!(count(&exit, |c| *c == Cmd::DisarmEscalation), 0);
        assert_eq!(core.run_state(), RunState::Stopped);
    }

    #[test]
    fn tickets_from_previous_cycles_are_stale() {
        let mut core = running(7);
        let old = armed_ticket(&core.step(SupervisorEvent::StopRequested));
        core.step(SupervisorEvent::ProcessExited {
            pid: 7,
            report: ExitReport::Terminated,
        });

        core.step(SupervisorEvent::StartRequested);
        core.step(SupervisorEvent::SpawnSucceeded {
            pid: 8,
            binary: "uxplay".into(),
        });
        let new = armed_ticket(&core.step(SupervisorEvent::StopRequested));
        assert_ne!(old, new);

        assert!(core
            .step(SupervisorEvent::EscalationElapsed { ticket: old })
            .commands
            .is_empty());
        assert_eq!(
            core.step(SupervisorEvent::EscalationElapsed { ticket: new }).commands,
            [Cmd::SendForceful { pid: 8 }]
        );
    }

    #[test]
    fn external_exit_while_running_drains_and_classifies() {
        let mut core = running(9);
        let step = core.step(SupervisorEvent::ProcessExited {
            pid: 9,
            report: ExitReport::Failed(1),
        });

        assert_eq!(core.run_state(), RunState::Stopped);
        assert_eq!(step.commands[0], Cmd::DrainReaders);
        assert!(matches!(
            step.commands.last(),
            Some(Cmd::Log { source: StreamSource::Stderr, text })
                if text == "uxplay process (PID: 9) exited with status 1."
        ));
    }

    #[test]
    fn exit_of_other_pid_is_ignored() {
        let mut core = running(9);
        let step = core.step(SupervisorEvent::ProcessExited {
            pid: 10,
            report: ExitReport::Clean,
        });
        assert!(step.commands.is_empty());
        assert_eq!(core.run_state(), RunState::Running);
    }

    #[test]
    fn shutdown_while_running_signals_without_escalation() {
        let mut core = running(3);
        let step = core.step(SupervisorEvent::ShutdownRequested);

        assert!(!step.keep_running);
        assert!(step.commands.contains(&Cmd::SendGraceful { pid: 3 }));
        assert_eq!(step.commands.last(), Some(&Cmd::DisarmEscalation));
        assert!(!core.escalation_armed());
    }

    #[test]
    fn shutdown_entry_differs_from_a_requested_stop() {
        let mut core = running(3);
        let step = core.step(SupervisorEvent::ShutdownRequested);

        let texts: Vec<&str> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                Cmd::Log { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            texts,
            [
                "Supervisor is shutting down, stopping uxplay process.",
                "Attempting to stop uxplay process.",
            ]
        );
    }

    #[test]
    fn shutdown_while_stopped_just_ends_the_loop() {
        let mut core = core();
        let step = core.step(SupervisorEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert_eq!(step.commands, [Cmd::CancelReaders, Cmd::DisarmEscalation]);
    }
}
