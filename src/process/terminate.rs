//! Platform-specific process termination.
//!
//! The cleanup algorithm in the registry is platform independent; only the
//! act of delivering a graceful or forced termination differs per OS.

use super::registry::TrackedProcess;

/// Strength of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateKind {
    /// Ask the process (tree) to exit: SIGTERM, or `taskkill /T`.
    Graceful,
    /// Kill the process (tree) outright: SIGKILL, or `taskkill /T /F`.
    Forced,
}

/// Delivers termination requests to tracked processes.
///
/// Implementations are best-effort and must never panic: failures to signal
/// a process that already exited are expected.
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self, process: &TrackedProcess, kind: TerminateKind);
}

/// Terminator for the platform this binary was built for.
pub fn platform_terminator() -> Box<dyn ProcessTerminator> {
    #[cfg(unix)]
    {
        Box::new(PosixTerminator)
    }
    #[cfg(windows)]
    {
        Box::new(WindowsTerminator)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Box::new(KillOnlyTerminator)
    }
}

/// Signals the child's process group when it leads its own group, otherwise
/// the single process. The group is signalled even after the leader has been
/// reaped, so members it backgrounded are still reached.
#[cfg(unix)]
pub struct PosixTerminator;

#[cfg(unix)]
impl ProcessTerminator for PosixTerminator {
    fn terminate(&self, process: &TrackedProcess, kind: TerminateKind) {
        let signal = match kind {
            TerminateKind::Graceful => libc::SIGTERM,
            TerminateKind::Forced => libc::SIGKILL,
        };

        if let Some(group) = process.group().and_then(|g| libc::pid_t::try_from(g).ok()) {
            // SAFETY: kill takes plain integers and has no memory-safety
            // preconditions.
            let signalled = unsafe { libc::kill(-group, signal) } == 0;
            if signalled || !process.leader_alive() {
                return;
            }
        }

        match kind {
            TerminateKind::Graceful => {
                let Ok(pid) = libc::pid_t::try_from(process.pid()) else {
                    return;
                };
                // SAFETY: see above.
                unsafe {
                    libc::kill(pid, signal);
                }
            }
            TerminateKind::Forced => {
                let _ = process.kill();
            }
        }
    }
}

/// Uses `taskkill /T` so the whole process tree goes down.
#[cfg(windows)]
pub struct WindowsTerminator;

#[cfg(windows)]
impl ProcessTerminator for WindowsTerminator {
    fn terminate(&self, process: &TrackedProcess, kind: TerminateKind) {
        use std::process::{Command, Stdio};

        let pid = process.pid().to_string();
        let mut command = Command::new("taskkill");
        command.args(["/PID", &pid, "/T"]);
        if kind == TerminateKind::Forced {
            command.arg("/F");
        }
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if kind == TerminateKind::Forced && !matches!(status, Ok(s) if s.success()) {
            let _ = process.kill();
        }
    }
}

/// Fallback for platforms without signals or taskkill.
#[cfg(not(any(unix, windows)))]
pub struct KillOnlyTerminator;

#[cfg(not(any(unix, windows)))]
impl ProcessTerminator for KillOnlyTerminator {
    fn terminate(&self, process: &TrackedProcess, _kind: TerminateKind) {
        let _ = process.kill();
    }
}
