use proptest::prelude::*;
use mirrorctl::engine::{SupervisorCommand, SupervisorCore, SupervisorEvent, SupervisorOptions};
use mirrorctl::exec::ExitReport;
use mirrorctl::types::RunState;

/// Abstract input; concrete pids and tickets are filled in from what the
/// core has handed out so far, so most events hit live state.
#[derive(Debug, Clone)]
enum Input {
    Start,
    Stop,
    SpawnOk,
    SpawnFail,
    ExitCurrent(bool),
    ExitStale,
    Escalate { stale: bool },
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        3 => Just(Input::Start),
        3 => Just(Input::Stop),
        2 => Just(Input::SpawnOk),
        1 => Just(Input::SpawnFail),
        2 => any::<bool>().prop_map(Input::ExitCurrent),
        1 => Just(Input::ExitStale),
        2 => any::<bool>().prop_map(|stale| Input::Escalate { stale }),
    ]
}

proptest! {
    #[test]
    fn forceful_terminate_is_bounded_and_targets_the_live_child(
        inputs in proptest::collection::vec(input(), 1..80),
    ) {
        let mut core = SupervisorCore::new("uxplay", true, SupervisorOptions::default());
        let mut next_pid = 100u32;
        let mut last_ticket: Option<u64> = None;
        let mut forceful_this_cycle = 0usize;

        for input in inputs {
            let before_state = core.run_state();
            let before_pid = core.pid();

            let event = match input {
                Input::Start => SupervisorEvent::StartRequested,
                Input::Stop => SupervisorEvent::StopRequested,
                Input::SpawnOk => {
                    next_pid += 1;
                    SupervisorEvent::SpawnSucceeded { pid: next_pid, binary: "uxplay".into() }
                }
                Input::SpawnFail => SupervisorEvent::SpawnFailed {
                    binary: "uxplay".into(),
                    error: "boom".into(),
                },
                Input::ExitCurrent(killed) => SupervisorEvent::ProcessExited {
                    pid: before_pid.unwrap_or(next_pid),
                    report: if killed { ExitReport::Killed } else { ExitReport::Failed(1) },
                },
                Input::ExitStale => SupervisorEvent::ProcessExited {
                    pid: 1,
                    report: ExitReport::Clean,
                },
                Input::Escalate { stale } => SupervisorEvent::EscalationElapsed {
                    ticket: match (stale, last_ticket) {
                        (false, Some(ticket)) => ticket,
                        _ => u64::MAX,
                    },
                },
            };

            let step = core.step(event);
            prop_assert!(step.keep_running);

            for command in &step.commands {
                match command {
                    SupervisorCommand::ArmEscalation { ticket, .. } => {
                        last_ticket = Some(*ticket);
                        forceful_this_cycle = 0;
                    }
                    SupervisorCommand::SendForceful { pid } => {
                        prop_assert_eq!(before_state, RunState::Stopping);
                        prop_assert_eq!(Some(*pid), before_pid);
                        forceful_this_cycle += 1;
                    }
                    SupervisorCommand::SendGraceful { pid } => {
                        prop_assert_eq!(before_state, RunState::Running);
                        prop_assert_eq!(Some(*pid), before_pid);
                    }
                    SupervisorCommand::Spawn => {
                        prop_assert_eq!(before_state, RunState::Stopped);
                    }
                    _ => {}
                }
            }
            prop_assert!(forceful_this_cycle <= 1);

            prop_assert_eq!(core.pid().is_some(), core.run_state().has_process());
            if !core.run_state().has_process() {
                prop_assert!(!core.escalation_armed());
            }
        }
    }
}
