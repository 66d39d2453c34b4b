use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{oneshot, Notify};

use mirrorctl::errors::{MirrorError, Result};
use mirrorctl::exec::{
    ExitFuture, ExitReport, OutputStream, ProcessBackend, ProcessControl, SpawnedProcess,
};
use mirrorctl::launch::LaunchSpec;

const PIPE_CAPACITY: usize = 64 * 1024;

/// A fake process backend that:
/// - records every launch spec it was asked to spawn
/// - hands out in-memory stdout/stderr pipes the test can write to
/// - exits a "process" when the test says so, or when it is signalled
///
/// Clones share state, so a test keeps one clone and gives the other to the
/// supervisor.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<BackendState>>,
    spawned: Arc<Notify>,
}

#[derive(Default)]
struct BackendState {
    missing: HashSet<String>,
    spawn_error: Option<String>,
    ignore_terminate: bool,
    fail_signals: bool,
    broken_stdout: bool,
    next_pid: u32,
    specs: Vec<LaunchSpec>,
    processes: Vec<FakeProcess>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.inner.lock().unwrap()
    }

    /// Pretend `binary` is not installed.
    pub fn without_binary(self, binary: &str) -> Self {
        self.state().missing.insert(binary.to_string());
        self
    }

    /// Make every following spawn fail with `message` (until cleared).
    pub fn fail_spawns_with(&self, message: Option<&str>) {
        self.state().spawn_error = message.map(str::to_string);
    }

    /// Processes spawned from now on ignore the graceful terminate signal.
    pub fn hang_on_terminate(&self, hang: bool) {
        self.state().ignore_terminate = hang;
    }

    /// Processes spawned from now on reject every signal (as if the pid
    /// belonged to another user); they only exit when the test says so.
    pub fn fail_signals(&self, fail: bool) {
        self.state().fail_signals = fail;
    }

    /// Processes spawned from now on have a stdout that fails on first read.
    pub fn break_stdout(&self, broken: bool) {
        self.state().broken_stdout = broken;
    }

    pub fn spawn_count(&self) -> usize {
        self.state().specs.len()
    }

    pub fn specs(&self) -> Vec<LaunchSpec> {
        self.state().specs.clone()
    }

    pub fn processes(&self) -> Vec<FakeProcess> {
        self.state().processes.clone()
    }

    pub fn last_process(&self) -> Option<FakeProcess> {
        self.state().processes.last().cloned()
    }

    /// Wait until at least `n` processes have been spawned.
    pub async fn wait_for_spawns(&self, n: usize) -> FakeProcess {
        loop {
            let notified = self.spawned.notified();
            {
                let state = self.state();
                if state.processes.len() >= n {
                    return state.processes[n - 1].clone();
                }
            }
            notified.await;
        }
    }
}

impl ProcessBackend for FakeBackend {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        if self.state().missing.contains(binary) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(binary))
        }
    }

    fn spawn(
        &mut self,
        spec: &LaunchSpec,
    ) -> Pin<Box<dyn Future<Output = Result<SpawnedProcess>> + Send + '_>> {
        let result = {
            let mut state = self.state();
            state.specs.push(spec.clone());
            match state.spawn_error.clone() {
                Some(message) => Err(MirrorError::Spawn(message)),
                None => {
                    state.next_pid += 1;
                    let pid = 1000 + state.next_pid;
                    let behaviour = Behaviour {
                        ignore_terminate: state.ignore_terminate,
                        fail_signals: state.fail_signals,
                        broken_stdout: state.broken_stdout,
                    };
                    let (process, spawned) = FakeProcess::start(pid, behaviour);
                    state.processes.push(process);
                    Ok(spawned)
                }
            }
        };
        self.spawned.notify_waiters();
        Box::pin(async move { result })
    }
}

/// Test-side view of one fake child.
#[derive(Clone)]
pub struct FakeProcess {
    pid: u32,
    inner: Arc<ProcessInner>,
}

#[derive(Debug, Clone, Copy)]
struct Behaviour {
    ignore_terminate: bool,
    fail_signals: bool,
    broken_stdout: bool,
}

struct ProcessInner {
    stdout: Mutex<Option<DuplexStream>>,
    stderr: Mutex<Option<DuplexStream>>,
    exit_tx: Mutex<Option<oneshot::Sender<ExitReport>>>,
    exited: AtomicBool,
    behaviour: Behaviour,
    terminates: AtomicUsize,
    kills: AtomicUsize,
}

impl FakeProcess {
    fn start(pid: u32, behaviour: Behaviour) -> (Self, SpawnedProcess) {
        let (stdout_tx, stdout_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_tx, stderr_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();

        let inner = Arc::new(ProcessInner {
            stdout: Mutex::new(Some(stdout_tx)),
            stderr: Mutex::new(Some(stderr_tx)),
            exit_tx: Mutex::new(Some(exit_tx)),
            exited: AtomicBool::new(false),
            behaviour,
            terminates: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
        });

        let exit: ExitFuture = Box::pin(async move {
            exit_rx
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "fake process dropped"))
        });

        let stdout: OutputStream = if behaviour.broken_stdout {
            Box::new(FailingPipe)
        } else {
            Box::new(stdout_rx)
        };
        let spawned = SpawnedProcess {
            pid,
            stdout: Some(stdout),
            stderr: Some(Box::new(stderr_rx)),
            control: Box::new(FakeControl {
                inner: inner.clone(),
            }),
            exit,
        };
        (Self { pid, inner }, spawned)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub async fn write_stdout(&self, line: &str) {
        write_line(&self.inner, &self.inner.stdout, line).await;
    }

    pub async fn write_stderr(&self, line: &str) {
        write_line(&self.inner, &self.inner.stderr, line).await;
    }

    /// Exit with `report`: closes both pipes, then resolves the exit future.
    /// Only the first call has an effect.
    pub fn exit(&self, report: ExitReport) {
        self.inner.exit(report);
    }

    pub fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> usize {
        self.inner.terminates.load(Ordering::SeqCst)
    }

    pub fn kill_count(&self) -> usize {
        self.inner.kills.load(Ordering::SeqCst)
    }
}

impl ProcessInner {
    fn exit(&self, report: ExitReport) {
        if self.exited.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stdout.lock().unwrap().take();
        self.stderr.lock().unwrap().take();
        if let Some(tx) = self.exit_tx.lock().unwrap().take() {
            let _ = tx.send(report);
        }
    }
}

async fn write_line(inner: &ProcessInner, pipe: &Mutex<Option<DuplexStream>>, line: &str) {
    let Some(mut writer) = pipe.lock().unwrap().take() else {
        return;
    };
    let _ = writer.write_all(format!("{line}\n").as_bytes()).await;
    // Exit closes the pipes; do not resurrect one.
    if !inner.exited.load(Ordering::SeqCst) {
        *pipe.lock().unwrap() = Some(writer);
    }
}

#[derive(Debug)]
struct FakeControl {
    inner: Arc<ProcessInner>,
}

impl std::fmt::Debug for ProcessInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessInner")
            .field("exited", &self.exited)
            .field("terminates", &self.terminates)
            .field("kills", &self.kills)
            .finish_non_exhaustive()
    }
}

fn no_such_process() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "no such process")
}

fn not_permitted() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted")
}

/// Output pipe whose every read fails.
struct FailingPipe;

impl AsyncRead for FailingPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke")))
    }
}

impl ProcessControl for FakeControl {
    fn terminate(&self) -> io::Result<()> {
        self.inner.terminates.fetch_add(1, Ordering::SeqCst);
        if self.inner.exited.load(Ordering::SeqCst) {
            return Err(no_such_process());
        }
        if self.inner.behaviour.fail_signals {
            return Err(not_permitted());
        }
        if !self.inner.behaviour.ignore_terminate {
            self.inner.exit(ExitReport::Terminated);
        }
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        self.inner.kills.fetch_add(1, Ordering::SeqCst);
        if self.inner.exited.load(Ordering::SeqCst) {
            return Err(no_such_process());
        }
        if self.inner.behaviour.fail_signals {
            return Err(not_permitted());
        }
        self.inner.exit(ExitReport::Killed);
        Ok(())
    }
}
