// src/exec/mod.rs

//! Process execution layer.
//!
//! Everything that touches the child process itself lives here; the
//! supervisor in [`crate::engine`] only decides *when* to do it.
//!
//! - [`backend`] provides the `ProcessBackend` trait and the production
//!   `TokioProcessBackend`, which tests replace with a fake.
//! - [`reader`] drains one output channel into a [`reader::StreamObserver`].
//! - [`signal`] delivers graceful / forceful terminate signals.
//! - [`exit`] classifies how the child ended.

pub mod backend;
pub mod exit;
pub mod reader;
pub mod signal;

pub use backend::{
    ExitFuture, OutputStream, ProcessBackend, ProcessControl, SpawnedProcess, TokioProcessBackend,
};
pub use exit::ExitReport;
pub use reader::{ReadOutcome, StreamObserver, StreamReader};
