// src/engine/handle.rs

use tokio::sync::{broadcast, mpsc, watch};

use crate::engine::SupervisorEvent;
use crate::errors::{MirrorError, Result};
use crate::sink::LogSink;
use crate::status::Status;
use crate::types::RunState;

/// Cheap, cloneable front end of a running [`Supervisor`].
///
/// The supervisor loop ends (shutting the child down) once every handle has
/// been dropped.
///
/// [`Supervisor`]: crate::engine::Supervisor
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    events: mpsc::Sender<SupervisorEvent>,
    status: watch::Receiver<Status>,
    transitions: broadcast::Sender<RunState>,
    sink: LogSink,
}

impl SupervisorHandle {
    pub(crate) fn new(
        events: mpsc::Sender<SupervisorEvent>,
        status: watch::Receiver<Status>,
        transitions: broadcast::Sender<RunState>,
        sink: LogSink,
    ) -> Self {
        Self {
            events,
            status,
            transitions,
            sink,
        }
    }

    async fn send(&self, event: SupervisorEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| MirrorError::SupervisorClosed)
    }

    /// Request a start; a no-op unless the supervisor is Stopped.
    pub async fn start(&self) -> Result<()> {
        self.send(SupervisorEvent::StartRequested).await
    }

    /// Request a stop; a no-op unless a process is running.
    pub async fn stop(&self) -> Result<()> {
        self.send(SupervisorEvent::StopRequested).await
    }

    /// Stop any running process without waiting for it and end the loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(SupervisorEvent::ShutdownRequested).await
    }

    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Every subsequent run state transition.
    pub fn transitions(&self) -> broadcast::Receiver<RunState> {
        self.transitions.subscribe()
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Wait until the published run state equals `state`.
    pub async fn wait_for_state(&self, state: RunState) -> Result<Status> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|status| status.run_state == state)
            .await
            .map_err(|_| MirrorError::SupervisorClosed)?;
        Ok(*status)
    }
}
