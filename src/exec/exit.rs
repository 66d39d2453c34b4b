// src/exec/exit.rs

use std::fmt;
use std::process::ExitStatus;

/// Graceful terminate signal number.
pub const SIGTERM: i32 = 15;
/// Forceful terminate signal number.
pub const SIGKILL: i32 = 9;

/// How the backend process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReport {
    /// Zero exit status.
    Clean,
    /// Killed by the graceful terminate signal.
    Terminated,
    /// Killed by the forceful terminate signal.
    Killed,
    /// Non-zero exit status.
    Failed(i32),
    /// Killed by any other signal.
    Signalled(i32),
}

impl ExitReport {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            ExitReport::Clean
        } else {
            ExitReport::Failed(code)
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        match signal {
            SIGTERM => ExitReport::Terminated,
            SIGKILL => ExitReport::Killed,
            other => ExitReport::Signalled(other),
        }
    }

    /// Clean exits and our own terminate signals are not errors.
    pub fn is_expected(self) -> bool {
        matches!(
            self,
            ExitReport::Clean | ExitReport::Terminated | ExitReport::Killed
        )
    }

    /// Numeric status in the shell convention: exit code, or signal number
    /// for signal deaths.
    pub fn status(self) -> i32 {
        match self {
            ExitReport::Clean => 0,
            ExitReport::Terminated => SIGTERM,
            ExitReport::Killed => SIGKILL,
            ExitReport::Failed(code) => code,
            ExitReport::Signalled(signal) => signal,
        }
    }
}

impl From<ExitStatus> for ExitReport {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitReport::from_signal(signal);
            }
        }
        ExitReport::from_code(status.code().unwrap_or(-1))
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReport::Clean => f.write_str("0"),
            ExitReport::Terminated => write!(f, "{SIGTERM} (SIGTERM)"),
            ExitReport::Killed => write!(f, "{SIGKILL} (SIGKILL)"),
            ExitReport::Failed(code) => write!(f, "{code}"),
            ExitReport::Signalled(signal) => write!(f, "{signal} (signal)"),
        }
    }
}
