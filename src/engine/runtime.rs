// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::handle::SupervisorHandle;
use crate::engine::{SupervisorCommand, SupervisorCore, SupervisorEvent, SupervisorOptions};
use crate::errors::{MirrorError, Result};
use crate::exec::signal::Signal;
use crate::exec::{
    ExitFuture, ExitReport, OutputStream, ProcessBackend, ProcessControl, SpawnedProcess,
    StreamObserver, StreamReader,
};
use crate::fs::FileSystem;
use crate::launch::{self, Materialized};
use crate::settings::{keys, SettingsStore};
use crate::sink::LogSink;
use crate::status::{Status, StatusPublisher};
use crate::types::StreamSource;

/// The live child as seen by the shell.
///
/// Streams and the exit future are moved out when readers are attached and
/// the exit watcher is armed; the signal capability stays until release.
struct ProcessHandle {
    pid: u32,
    control: Box<dyn ProcessControl>,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit: Option<ExitFuture>,
}

impl From<SpawnedProcess> for ProcessHandle {
    fn from(process: SpawnedProcess) -> Self {
        Self {
            pid: process.pid,
            control: process.control,
            stdout: process.stdout,
            stderr: process.stderr,
            exit: Some(process.exit),
        }
    }
}

/// Async IO shell around [`SupervisorCore`].
///
/// Owns the backend, the process handle, both stream readers, the exit
/// watcher and the escalation timer. All of them are touched only from the
/// supervisor task, so no locking is needed here; the log sink does its own.
pub struct Supervisor<B: ProcessBackend> {
    core: SupervisorCore,
    backend: B,
    store: Arc<dyn SettingsStore>,
    fs: Arc<dyn FileSystem>,
    sink: LogSink,
    status: StatusPublisher,
    binary_available: bool,
    options: SupervisorOptions,
    event_rx: mpsc::Receiver<SupervisorEvent>,
    // Weak so that dropping every handle still ends the loop.
    self_tx: mpsc::WeakSender<SupervisorEvent>,
    process: Option<ProcessHandle>,
    readers: Vec<StreamReader>,
    exit_watcher: Option<JoinHandle<()>>,
    escalation: Option<JoinHandle<()>>,
}

impl<B: ProcessBackend> fmt::Debug for Supervisor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("pid", &self.process.as_ref().map(|p| p.pid))
            .field("readers", &self.readers.len())
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Supervisor<B> {
    pub fn new(
        backend: B,
        store: Arc<dyn SettingsStore>,
        fs: Arc<dyn FileSystem>,
    ) -> (Self, SupervisorHandle) {
        Self::with_options(backend, store, fs, SupervisorOptions::default())
    }

    /// Build the supervisor and its first handle.
    ///
    /// The backend binary is looked up once, here; when it is missing the
    /// supervisor stays Unavailable for its whole lifetime.
    pub fn with_options(
        backend: B,
        store: Arc<dyn SettingsStore>,
        fs: Arc<dyn FileSystem>,
        options: SupervisorOptions,
    ) -> (Self, SupervisorHandle) {
        let binary = store.snapshot().string(keys::BINARY).to_string();
        let binary_available = backend.binary_available(&binary);
        if !binary_available {
            warn!(%binary, "backend binary not found; start is disabled");
        }

        let core = SupervisorCore::new(binary, binary_available, options);
        let status = StatusPublisher::new(Status::initial(binary_available));
        let sink = LogSink::new(store.clone());

        let (tx, event_rx) = mpsc::channel(64);
        let self_tx = tx.downgrade();
        let handle = SupervisorHandle::new(
            tx,
            status.subscribe(),
            status.transitions_sender(),
            sink.clone(),
        );

        let supervisor = Self {
            core,
            backend,
            store,
            fs,
            sink,
            status,
            binary_available,
            options,
            event_rx,
            self_tx,
            process: None,
            readers: Vec::new(),
            exit_watcher: None,
            escalation: None,
        };
        (supervisor, handle)
    }

    /// Main event loop.
    ///
    /// Runs until a shutdown request, or until every handle is dropped
    /// (treated the same way).
    pub async fn run(mut self) -> Result<()> {
        info!(
            binary = %self.core.binary(),
            state = %self.core.run_state(),
            "supervisor started"
        );

        loop {
            let event = match self.event_rx.recv().await {
                Some(event) => event,
                None => {
                    info!("all supervisor handles dropped; shutting down");
                    SupervisorEvent::ShutdownRequested
                }
            };

            if !self.dispatch(event).await {
                break;
            }
        }

        self.teardown().await;
        info!("supervisor exiting");
        Ok(())
    }

    /// Feed `event` (and any follow-up events produced by commands) through
    /// the core. Returns whether the loop should continue.
    async fn dispatch(&mut self, event: SupervisorEvent) -> bool {
        let mut pending = VecDeque::from([event]);
        let mut keep_running = true;

        while let Some(event) = pending.pop_front() {
            debug!(?event, "supervisor received event");
            let step = self.core.step(event);

            for command in step.commands {
                if let Some(follow_up) = self.execute(command).await {
                    pending.push_back(follow_up);
                }
            }

            self.publish_status();
            keep_running &= step.keep_running;
        }

        keep_running
    }

    async fn execute(&mut self, command: SupervisorCommand) -> Option<SupervisorEvent> {
        match command {
            SupervisorCommand::Spawn => return Some(self.spawn().await),
            SupervisorCommand::AttachReaders => self.attach_readers(),
            SupervisorCommand::WatchExit => self.watch_exit(),
            SupervisorCommand::CancelReaders => self.cancel_readers().await,
            SupervisorCommand::DrainReaders => self.drain_readers().await,
            SupervisorCommand::SendGraceful { pid } => self.signal(pid, Signal::Terminate),
            SupervisorCommand::SendForceful { pid } => self.signal(pid, Signal::Kill),
            SupervisorCommand::ArmEscalation { ticket, delay } => {
                self.arm_escalation(ticket, delay)
            }
            SupervisorCommand::DisarmEscalation => self.disarm_escalation(),
            SupervisorCommand::ReleaseHandle => self.release_handle(),
            SupervisorCommand::Log { source, text } => {
                info!(%source, "{text}");
                self.sink.append(text, source);
            }
        }
        None
    }

    fn publish_status(&self) {
        self.status.publish(Status {
            run_state: self.core.run_state(),
            binary_available: self.binary_available,
            pid: self.core.pid(),
        });
    }

    async fn spawn(&mut self) -> SupervisorEvent {
        let settings = self.store.snapshot();
        let binary = settings.string(keys::BINARY).to_string();
        let Materialized { spec, artifact } = launch::materialize_from_settings(&settings);

        if let Some(artifact) = artifact {
            if !launch::persist(self.fs.as_ref(), &artifact) {
                self.sink.append(
                    format!(
                        "Failed to write config file {}; starting with the previous one.",
                        artifact.path.display()
                    ),
                    StreamSource::Stderr,
                );
            }
        }

        info!(%spec, "starting backend process");
        match self.backend.spawn(&spec).await {
            Ok(process) => {
                let pid = process.pid;
                self.process = Some(ProcessHandle::from(process));
                SupervisorEvent::SpawnSucceeded { pid, binary }
            }
            Err(err) => {
                error!(error = %err, "failed to start backend process");
                let error = match err {
                    MirrorError::Spawn(msg) => msg,
                    other => other.to_string(),
                };
                SupervisorEvent::SpawnFailed { binary, error }
            }
        }
    }

    fn attach_readers(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        let observer: Arc<dyn StreamObserver> = Arc::new(self.sink.clone());
        let streams = [
            (process.stdout.take(), StreamSource::Stdout),
            (process.stderr.take(), StreamSource::Stderr),
        ];
        for (stream, source) in streams {
            match stream {
                Some(stream) => self
                    .readers
                    .push(StreamReader::attach(stream, source, observer.clone())),
                None => warn!(%source, "pipe not available"),
            }
        }
    }

    fn watch_exit(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        let Some(exit) = process.exit.take() else {
            return;
        };
        let pid = process.pid;
        let tx = self.self_tx.clone();

        self.exit_watcher = Some(tokio::spawn(async move {
            let report = match exit.await {
                Ok(report) => report,
                Err(err) => {
                    warn!(pid, error = %err, "failed waiting for backend exit");
                    ExitReport::Failed(-1)
                }
            };
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SupervisorEvent::ProcessExited { pid, report }).await;
            }
        }));
    }

    async fn cancel_readers(&mut self) {
        for reader in std::mem::take(&mut self.readers) {
            let source = reader.source();
            let outcome = reader.cancel().await;
            debug!(%source, ?outcome, "stream reader stopped");
        }
    }

    async fn drain_readers(&mut self) {
        let deadline = Instant::now() + self.options.drain_grace;
        for reader in std::mem::take(&mut self.readers) {
            let source = reader.source();
            let grace = deadline.saturating_duration_since(Instant::now());
            let outcome = reader.finish(grace).await;
            debug!(%source, ?outcome, "stream reader drained");
        }
    }

    fn signal(&self, pid: u32, signal: Signal) {
        let Some(process) = self.process.as_ref().filter(|p| p.pid == pid) else {
            debug!(pid, ?signal, "no live handle; signal skipped");
            return;
        };

        let result = match signal {
            Signal::Terminate => process.control.terminate(),
            Signal::Kill => process.control.kill(),
        };
        match result {
            Ok(()) => info!(pid, signal = signal.number(), "signal sent to backend"),
            Err(err) => {
                error!(pid, signal = signal.number(), error = %err, "failed to signal backend")
            }
        }
    }

    fn arm_escalation(&mut self, ticket: u64, delay: Duration) {
        self.disarm_escalation();
        let tx = self.self_tx.clone();
        debug!(ticket, ?delay, "escalation timer armed");

        self.escalation = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SupervisorEvent::EscalationElapsed { ticket }).await;
            }
        }));
    }

    fn disarm_escalation(&mut self) {
        if let Some(timer) = self.escalation.take() {
            timer.abort();
            debug!("escalation timer disarmed");
        }
    }

    fn release_handle(&mut self) {
        if let Some(process) = self.process.take() {
            debug!(pid = process.pid, "process handle released");
        }
        // The watcher already delivered the exit.
        self.exit_watcher = None;
        // A timer that already fired has nothing left to do.
        self.escalation = None;
    }

    /// Drop whatever is still live after the loop ended. The child, if any,
    /// has been signalled and is left to exit on its own.
    async fn teardown(&mut self) {
        self.disarm_escalation();
        if let Some(watcher) = self.exit_watcher.take() {
            watcher.abort();
        }
        self.cancel_readers().await;
        if let Some(process) = self.process.take() {
            info!(pid = process.pid, "leaving backend process to exit on its own");
        }
    }
}
