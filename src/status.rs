// src/status.rs

//! Observable supervisor status.
//!
//! A `watch` channel carries the latest [`Status`] for observers that only
//! care about the current value; a `broadcast` channel carries every
//! [`RunState`] transition for observers that need each step.

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::types::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub run_state: RunState,
    pub binary_available: bool,
    pub pid: Option<u32>,
}

impl Status {
    pub fn initial(binary_available: bool) -> Self {
        Self {
            run_state: if binary_available {
                RunState::Stopped
            } else {
                RunState::Unavailable
            },
            binary_available,
            pid: None,
        }
    }

    /// Whether a start request can do anything right now.
    pub fn can_start(&self) -> bool {
        self.binary_available && self.run_state == RunState::Stopped
    }
}

#[derive(Debug)]
pub struct StatusPublisher {
    current: watch::Sender<Status>,
    transitions: broadcast::Sender<RunState>,
}

impl StatusPublisher {
    pub fn new(initial: Status) -> Self {
        let (current, _) = watch::channel(initial);
        let (transitions, _) = broadcast::channel(64);
        Self {
            current,
            transitions,
        }
    }

    pub fn current(&self) -> Status {
        *self.current.borrow()
    }

    /// Replace the status; observers are notified only when it changed.
    pub fn publish(&self, status: Status) {
        let previous = self.current();
        if previous == status {
            return;
        }
        if previous.run_state != status.run_state {
            debug!(from = %previous.run_state, to = %status.run_state, "run state changed");
            // No receivers is fine.
            let _ = self.transitions.send(status.run_state);
        }
        self.current.send_replace(status);
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.current.subscribe()
    }

    pub fn transitions(&self) -> broadcast::Receiver<RunState> {
        self.transitions.subscribe()
    }

    pub(crate) fn transitions_sender(&self) -> broadcast::Sender<RunState> {
        self.transitions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_follows_availability() {
        assert_eq!(Status::initial(true).run_state, RunState::Stopped);
        assert_eq!(Status::initial(false).run_state, RunState::Unavailable);
        assert!(!Status::initial(false).can_start());
    }

    #[test]
    fn publish_notifies_only_on_change() {
        let publisher = StatusPublisher::new(Status::initial(true));
        let mut watch_rx = publisher.subscribe();
        let mut transitions = publisher.transitions();

        publisher.publish(Status::initial(true));
        assert!(!watch_rx.has_changed().unwrap());

        publisher.publish(Status {
            run_state: RunState::Running,
            binary_available: true,
            pid: Some(5),
        });
        assert!(watch_rx.has_changed().unwrap());
        assert_eq!(watch_rx.borrow_and_update().pid, Some(5));
        assert_eq!(transitions.try_recv().unwrap(), RunState::Running);
        assert!(transitions.try_recv().is_err());
    }
}
