// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The supervisor talks to a `ProcessBackend` instead of `tokio::process`
//! directly, so tests can swap in a fake that hands out in-memory streams and
//! lets the test decide when (and how) the "process" exits.
//!
//! - `TokioProcessBackend` is the production implementation: it spawns the
//!   child with piped stdout/stderr and delivers signals with `kill(2)`.
//! - A spawned process is described by [`SpawnedProcess`]: pid, the two raw
//!   output streams, a signal capability and a future resolving on exit.

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{MirrorError, Result};
use crate::launch::LaunchSpec;

use super::exit::ExitReport;
use super::signal::{self, Signal};

/// One raw output channel of the child.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves once the child has exited and been reaped.
pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ExitReport>> + Send>>;

/// Signal-delivery capability for a live child.
pub trait ProcessControl: Send + Sync + Debug {
    /// Graceful terminate (SIGTERM).
    fn terminate(&self) -> io::Result<()>;

    /// Forceful terminate (SIGKILL).
    fn kill(&self) -> io::Result<()>;
}

/// A freshly spawned child.
pub struct SpawnedProcess {
    pub pid: u32,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
    pub control: Box<dyn ProcessControl>,
    pub exit: ExitFuture,
}

impl Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.pid)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how the backend binary is found and started.
pub trait ProcessBackend: Send + 'static {
    /// Resolve `binary` the way `execvp` would.
    fn locate(&self, binary: &str) -> Option<PathBuf>;

    fn binary_available(&self, binary: &str) -> bool {
        self.locate(binary).is_some()
    }

    /// Start the process described by `spec`.
    fn spawn(
        &mut self,
        spec: &LaunchSpec,
    ) -> Pin<Box<dyn Future<Output = Result<SpawnedProcess>> + Send + '_>>;
}

/// Production backend on top of `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessBackend;

impl TokioProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for TokioProcessBackend {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        find_in_path(binary)
    }

    fn spawn(
        &mut self,
        spec: &LaunchSpec,
    ) -> Pin<Box<dyn Future<Output = Result<SpawnedProcess>> + Send + '_>> {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.args())
            .envs(spec.env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Shutdown does not wait for the exit; the child must outlive
            // the handle.
            .kill_on_drop(false);

        let program = spec.program().to_string();
        let result = cmd
            .spawn()
            .with_context(|| format!("spawning '{program}'"))
            .map_err(|err| MirrorError::Spawn(format!("{err:#}")))
            .and_then(|child| into_spawned(child, &program));

        Box::pin(async move { result })
    }
}

fn into_spawned(mut child: tokio::process::Child, program: &str) -> Result<SpawnedProcess> {
    let pid = child
        .id()
        .ok_or_else(|| MirrorError::Spawn(format!("'{program}' exited before its pid was read")))?;

    let stdout = child.stdout.take().map(|s| Box::new(s) as OutputStream);
    let stderr = child.stderr.take().map(|s| Box::new(s) as OutputStream);

    info!(pid, program, "spawned backend process");

    let exit: ExitFuture = Box::pin(async move {
        let status = child.wait().await?;
        debug!(pid, ?status, "backend process reaped");
        Ok(ExitReport::from(status))
    });

    Ok(SpawnedProcess {
        pid,
        stdout,
        stderr,
        control: Box::new(PidControl { pid }),
        exit,
    })
}

/// Signals a child by pid.
#[derive(Debug, Clone, Copy)]
pub struct PidControl {
    pid: u32,
}

impl ProcessControl for PidControl {
    fn terminate(&self) -> io::Result<()> {
        signal::send(self.pid, Signal::Terminate)
    }

    fn kill(&self) -> io::Result<()> {
        signal::send(self.pid, Signal::Kill)
    }
}

/// Look `binary` up on `PATH`. Names containing a path separator are
/// checked directly.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }
    if binary.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(binary);
        return is_executable(&path).then_some(path);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn locate_finds_sh_and_rejects_nonsense() {
        let backend = TokioProcessBackend::new();
        assert!(backend.binary_available("sh"));
        assert!(!backend.binary_available("mirrorctl-definitely-not-installed"));
        assert!(!backend.binary_available(""));
    }

    #[test]
    fn explicit_paths_must_be_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::write(&plain, "x").unwrap();
        assert!(find_in_path(plain.to_str().unwrap()).is_none());
        assert!(find_in_path(dir.path().to_str().unwrap()).is_none());
    }

    #[tokio::test]
    async fn spawn_pipes_output_and_reports_exit() {
        let spec = LaunchSpec::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
            vec![],
        );
        let mut backend = TokioProcessBackend::new();
        let mut process = backend.spawn(&spec).await.unwrap();

        let mut out = String::new();
        process.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
        let mut err = String::new();
        process.stderr.take().unwrap().read_to_string(&mut err).await.unwrap();

        assert_eq!(out, "out\n");
        assert_eq!(err, "err\n");
        assert_eq!(process.exit.await.unwrap(), ExitReport::Failed(3));
    }

    #[tokio::test]
    async fn spawn_passes_environment_overrides() {
        let spec = LaunchSpec::new(
            "sh",
            vec!["-c".into(), "printf %s \"$UXPLAYRC\"".into()],
            vec![("UXPLAYRC".into(), "/tmp/rc".into())],
        );
        let mut process = TokioProcessBackend::new().spawn(&spec).await.unwrap();
        let mut out = String::new();
        process.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "/tmp/rc");
        assert_eq!(process.exit.await.unwrap(), ExitReport::Clean);
    }

    #[tokio::test]
    async fn terminate_is_reported_as_expected_exit() {
        let spec = LaunchSpec::new("sleep", vec!["30".into()], vec![]);
        let mut process = TokioProcessBackend::new().spawn(&spec).await.unwrap();
        process.control.terminate().unwrap();
        let report = process.exit.await.unwrap();
        assert_eq!(report, ExitReport::Terminated);
        assert!(report.is_expected());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = LaunchSpec::new("mirrorctl-definitely-not-installed", vec![], vec![]);
        let err = TokioProcessBackend::new().spawn(&spec).await.unwrap_err();
        assert!(matches!(err, MirrorError::Spawn(_)));
    }
}
