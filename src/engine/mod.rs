// src/engine/mod.rs

//! Process supervisor.
//!
//! The supervisor reacts to:
//! - start / stop / shutdown requests from a [`SupervisorHandle`]
//! - spawn results from the process backend
//! - exit notifications from the exit watcher
//! - escalation timer firings
//!
//! The pure state machine lives in [`core`] (transition logic in
//! [`transitions`]); the async/IO shell that spawns, signals and reads the
//! child is implemented in [`runtime`].

use std::time::Duration;

use crate::exec::ExitReport;

/// Delay between the graceful and the forceful terminate signal.
pub const ESCALATION_DELAY: Duration = Duration::from_secs(3);

/// How long readers may keep draining after the child exited on its own.
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Tunables shared by the core and the shell.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub escalation_delay: Duration,
    pub drain_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            escalation_delay: ESCALATION_DELAY,
            drain_grace: DRAIN_GRACE,
        }
    }
}

/// Events flowing into the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    StartRequested,
    StopRequested,
    /// The backend started the child.
    SpawnSucceeded { pid: u32, binary: String },
    /// The backend could not start the child.
    SpawnFailed { binary: String, error: String },
    /// The child identified by `pid` has exited and been reaped.
    ProcessExited { pid: u32, report: ExitReport },
    /// The escalation timer armed with `ticket` fired.
    EscalationElapsed { ticket: u64 },
    /// Tear the supervisor down (Ctrl-C, all handles dropped).
    ShutdownRequested,
}

pub mod core;
pub mod handle;
pub mod runtime;
pub mod transitions;

pub use self::core::SupervisorCore;
pub use handle::SupervisorHandle;
pub use runtime::Supervisor;
pub use transitions::{CoreStep, SupervisorCommand};
