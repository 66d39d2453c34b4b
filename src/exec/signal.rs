// src/exec/signal.rs

//! Signal delivery to a single pid.

use std::io;

use super::exit::{SIGKILL, SIGTERM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    pub fn number(self) -> i32 {
        match self {
            Signal::Terminate => SIGTERM,
            Signal::Kill => SIGKILL,
        }
    }
}

/// Send `signal` to `pid`.
#[cfg(unix)]
pub fn send(pid: u32, signal: Signal) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn send(pid: u32, signal: Signal) -> io::Result<()> {
    let _ = (pid, signal);
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are only supported on unix",
    ))
}
