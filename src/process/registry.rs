//! Registry of live subprocesses spawned while serving a request.
//!
//! One registry is constructed per process lifetime and shared (`Arc`) with
//! everything that can spawn children: the command adapter, the ADB collector,
//! the captioner, the timeout executor, the interrupt listener and the parent
//! watchdog. Membership is guarded by a mutex; dead handles are pruned
//! whenever the live set is enumerated.

use super::terminate::{ProcessTerminator, TerminateKind, platform_terminator};
use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default time cooperating children get to exit after the graceful signal.
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_millis(1500);

/// How long to wait for force-killed children to be reaped.
const FORCED_REAP_WAIT: Duration = Duration::from_millis(250);

/// Poll interval used while waiting for a child to exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared handle to one spawned OS process.
///
/// Cloning is cheap; every clone refers to the same child. The spawner keeps
/// one clone to collect output and exit status while the registry keeps
/// another for cleanup.
///
/// A child that leads its own process group is tracked as the whole group:
/// it stays live while any member of the group is still running, even after
/// the leader itself has exited.
#[derive(Debug, Clone)]
pub struct TrackedProcess {
    pid: u32,
    group: Option<u32>,
    child: Arc<Mutex<Child>>,
}

impl TrackedProcess {
    /// Wrap a freshly spawned child.
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            pid,
            group: own_process_group(pid),
            child: Arc::new(Mutex::new(child)),
        }
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Process group led by this child, if it was spawned into its own group.
    pub fn group(&self) -> Option<u32> {
        self.group
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Non-blocking exit check. `Ok(None)` means still running.
    pub fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        self.lock().try_wait()
    }

    /// Whether the leader process itself is still running. Errors count as dead.
    pub fn leader_alive(&self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Whether any other member of the child's process group is still running.
    ///
    /// Only meaningful once the leader has been reaped; before that the
    /// leader itself keeps the group populated.
    pub fn group_alive(&self) -> bool {
        self.group.is_some_and(group_has_members)
    }

    /// Whether the leader or anything left in its process group is running.
    pub fn is_alive(&self) -> bool {
        // Reap the leader first so a zombie does not keep the group populated.
        self.leader_alive() || self.group_alive()
    }

    /// Wait up to `timeout` for the leader and its whole group to be gone.
    pub fn wait_gone(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if matches!(self.wait_timeout(timeout), Ok(None)) {
            return false;
        }
        loop {
            if !self.group_alive() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Wait up to `timeout` for the leader process to exit.
    ///
    /// Polls instead of blocking in `wait()` so the child lock is never held
    /// for longer than one `try_wait` call.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Force-kill this single process (SIGKILL / TerminateProcess).
    pub fn kill(&self) -> io::Result<()> {
        self.lock().kill()
    }

    pub fn take_stdin(&self) -> Option<ChildStdin> {
        self.lock().stdin.take()
    }

    pub fn take_stdout(&self) -> Option<ChildStdout> {
        self.lock().stdout.take()
    }

    pub fn take_stderr(&self) -> Option<ChildStderr> {
        self.lock().stderr.take()
    }
}

#[cfg(unix)]
fn own_process_group(pid: u32) -> Option<u32> {
    let pid = libc::pid_t::try_from(pid).ok()?;
    // SAFETY: getpgid and getpgrp take plain integers and have no
    // memory-safety preconditions.
    let (group, own) = unsafe { (libc::getpgid(pid), libc::getpgrp()) };
    (group == pid && group != own).then_some(pid as u32)
}

#[cfg(not(unix))]
fn own_process_group(_pid: u32) -> Option<u32> {
    None
}

#[cfg(unix)]
fn group_has_members(group: u32) -> bool {
    let Ok(group) = libc::pid_t::try_from(group) else {
        return false;
    };
    // SAFETY: signal 0 only probes for existence.
    unsafe { libc::kill(-group, 0) == 0 }
}

#[cfg(not(unix))]
fn group_has_members(_group: u32) -> bool {
    false
}

/// Process-wide set of tracked subprocesses.
pub struct SubprocessRegistry {
    tracked: Mutex<Vec<TrackedProcess>>,
    terminator: Box<dyn ProcessTerminator>,
}

impl Default for SubprocessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubprocessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessRegistry")
            .field("tracked", &self.lock().len())
            .finish()
    }
}

impl SubprocessRegistry {
    /// Registry using the current platform's termination strategy.
    pub fn new() -> Self {
        Self::with_terminator(platform_terminator())
    }

    /// Registry with an explicit termination strategy.
    pub fn with_terminator(terminator: Box<dyn ProcessTerminator>) -> Self {
        Self {
            tracked: Mutex::new(Vec::new()),
            terminator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TrackedProcess>> {
        // Cleanup runs from signal and watchdog threads; a poisoned lock must
        // not stop it.
        self.tracked
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Add a handle to the tracked set. Registering the same pid twice is a no-op.
    pub fn register(&self, process: TrackedProcess) {
        let mut tracked = self.lock();
        if tracked.iter().any(|p| p.pid == process.pid) {
            return;
        }
        debug!(pid = process.pid, "tracking subprocess");
        tracked.push(process);
    }

    /// Return every handle still alive, dropping dead ones from the set.
    pub fn collect_live(&self) -> Vec<TrackedProcess> {
        let mut tracked = self.lock();
        tracked.retain(|p| p.is_alive());
        tracked.clone()
    }

    /// Send one termination request to a single handle.
    pub fn terminate(&self, process: &TrackedProcess, kind: TerminateKind) {
        self.terminator.terminate(process, kind);
    }

    /// Terminate every live tracked process, gracefully then forcefully.
    ///
    /// All live processes receive the graceful request before any of them is
    /// force-killed. Returns the number of processes that were live when the
    /// call started. Idempotent and infallible.
    pub fn cleanup(&self, grace: Duration) -> usize {
        let live = self.collect_live();
        if live.is_empty() {
            return 0;
        }

        let pids: Vec<u32> = live.iter().map(TrackedProcess::pid).collect();
        debug!(?pids, "terminating tracked subprocesses");
        self.terminate_all(&live, grace);

        self.collect_live();
        info!(count = live.len(), "reclaimed tracked subprocesses");
        live.len()
    }

    /// Terminate whatever is left of one handle's process group.
    ///
    /// Used once a leader has exited on its own while processes it
    /// backgrounded keep running. Returns whether anything was left.
    pub fn reclaim_group(&self, process: &TrackedProcess, grace: Duration) -> bool {
        if !process.is_alive() {
            return false;
        }
        debug!(pid = process.pid(), group = ?process.group(), "reclaiming stray group members");
        self.terminate_all(std::slice::from_ref(process), grace);
        true
    }

    fn terminate_all(&self, live: &[TrackedProcess], grace: Duration) {
        for process in live {
            self.terminator.terminate(process, TerminateKind::Graceful);
        }

        let deadline = Instant::now() + grace;
        for process in live {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            process.wait_gone(remaining);
        }

        let survivors: Vec<&TrackedProcess> = live.iter().filter(|p| p.is_alive()).collect();
        for process in &survivors {
            warn!(pid = process.pid(), "subprocess ignored graceful termination, killing");
            self.terminator.terminate(process, TerminateKind::Forced);
        }
        for process in &survivors {
            process.wait_gone(FORCED_REAP_WAIT);
        }
    }
}
