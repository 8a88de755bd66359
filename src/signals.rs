//! Bridges interactive control requests to the job supervisor.
//!
//! Keys seen by the line editor and OS signal notifications both end up as a
//! [`Control`], which [`apply`] maps onto supervisor calls. The platform kill
//! primitive also lives here so the supervisor never deals with signals.

use crate::executor::{ExecError, KillSignal, Spawner};
use crate::state::JobId;
use crate::supervisor::Supervisor;
use crate::terminal::Terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Ctrl-C
    Interrupt,
    /// Ctrl-Z
    Suspend,
    /// Ctrl-D on an empty line
    ForceQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Die now. No job cleanup.
    ForceQuit,
}

pub const FORCE_QUIT_NOTICE: &str = "Use exit to quit jobsh. Leaving without cleaning up jobs.";

pub fn apply<S: Spawner, T: Terminal>(control: Control, supervisor: &mut Supervisor<S, T>) -> Action {
    match control {
        Control::Interrupt => {
            supervisor.interrupt_foreground();
            Action::Continue
        }
        Control::Suspend => {
            supervisor.suspend_foreground();
            Action::Continue
        }
        Control::ForceQuit => {
            supervisor.terminal_mut().print_line(FORCE_QUIT_NOTICE);
            Action::ForceQuit
        }
    }
}

/// Deliver `signal` to a single process.
#[cfg(unix)]
pub fn kill_process(pid: JobId, signal: KillSignal) -> Result<(), ExecError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let sig = match signal {
        KillSignal::Interrupt => Signal::SIGINT,
        KillSignal::Terminate => Signal::SIGTERM,
    };
    kill(Pid::from_raw(pid.0 as i32), sig).map_err(|e| ExecError::Kill {
        pid,
        reason: e.to_string(),
    })
}

/// No per-process signals here: force-kill the process tree by pid.
#[cfg(not(unix))]
pub fn kill_process(pid: JobId, _signal: KillSignal) -> Result<(), ExecError> {
    use std::process::{Command, Stdio};

    Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| ExecError::Kill {
            pid,
            reason: e.to_string(),
        })
}

/// Interrupt and suspend requests that arrive as real signals, which happens
/// whenever the line editor is not holding the terminal in raw mode.
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    suspend: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Must be called from inside the runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            // Replaces the default stop action: the shell itself never stops
            suspend: signal(SignalKind::from_raw(nix::libc::SIGTSTP))?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    pub async fn recv(&mut self) -> Control {
        tokio::select! {
            _ = self.interrupt.recv() => Control::Interrupt,
            _ = self.suspend.recv() => Control::Suspend,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Control {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Control::Interrupt,
            Err(_) => std::future::pending().await,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_kill_unknown_pid() {
        // Max pid on Linux is well below this
        let err = kill_process(JobId(i32::MAX as u32), KillSignal::Terminate).unwrap_err();
        assert!(matches!(err, ExecError::Kill { .. }));
        assert!(err.to_string().contains(&i32::MAX.to_string()));
    }
}
