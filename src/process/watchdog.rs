//! Parent-process death watchdog.
//!
//! The CLI is usually driven by another tool (an editor agent, a shell
//! script). If that caller disappears mid-task, any adapter or `adb` child we
//! spawned would otherwise keep driving the device. The watchdog notices the
//! parent going away, reclaims every tracked subprocess and exits with
//! [`exit_codes::INTERRUPTED`].

use super::registry::SubprocessRegistry;
use crate::exit_codes;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// How often the parent pid is sampled.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Whether the observed parent differs from the one captured at startup.
///
/// A parent pid of 0 or 1 means we were reparented to init (or a subreaper
/// that reports as 1), which also counts as the original parent being gone.
pub fn parent_diverged(original: u32, current: u32) -> bool {
    current == 0 || current == 1 || current != original
}

/// Block until `current_parent` reports a parent different from `original`.
///
/// Returns the diverged parent pid. Split out from [`start`] so the polling
/// loop can be driven by a fake pid source in tests.
pub fn watch_parent<F>(original: u32, mut current_parent: F, interval: Duration) -> u32
where
    F: FnMut() -> u32,
{
    loop {
        let current = current_parent();
        if parent_diverged(original, current) {
            return current;
        }
        thread::sleep(interval);
    }
}

/// Start the watchdog thread for the lifetime of the process.
///
/// Returns `None` when there is nothing meaningful to watch: the process was
/// already orphaned at startup, or the platform has no parent-pid API.
pub fn start(registry: Arc<SubprocessRegistry>, grace: Duration) -> Option<JoinHandle<()>> {
    #[cfg(unix)]
    {
        let original = std::os::unix::process::parent_id();
        if original <= 1 {
            debug!(ppid = original, "already detached from parent, watchdog disabled");
            return None;
        }

        request_parent_death_signal();
        if std::os::unix::process::parent_id() != original {
            // The parent exited between the first sample and the prctl call.
            force_exit(&registry, grace, original);
        }

        let spawned = thread::Builder::new()
            .name("gui-agent-parent-watchdog".to_string())
            .spawn(move || {
                let current = watch_parent(original, std::os::unix::process::parent_id, POLL_INTERVAL);
                warn!(original, current, "parent process went away");
                force_exit(&registry, grace, original);
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to start parent watchdog");
                None
            }
        }
    }
    #[cfg(windows)]
    {
        windows::start(registry, grace)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (registry, grace);
        debug!("parent watchdog is not supported on this platform");
        None
    }
}

/// Ask the kernel to deliver SIGTERM when the parent dies.
///
/// The interrupt listener turns that signal into the normal interrupted
/// cleanup path, so this only shortens detection latency; polling remains the
/// authoritative check.
///
/// The kernel ties this to the parent *thread* that forked us, not the parent
/// process: a caller that spawns from a short-lived worker thread triggers it
/// while still alive, and the run is reported as interrupted.
#[cfg(target_os = "linux")]
fn request_parent_death_signal() {
    // SAFETY: prctl with PR_SET_PDEATHSIG takes a plain signal number.
    let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) };
    if rc != 0 {
        debug!(error = %std::io::Error::last_os_error(), "PR_SET_PDEATHSIG unavailable");
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn request_parent_death_signal() {}

/// Reclaim subprocesses and terminate immediately, skipping destructors.
fn force_exit(registry: &SubprocessRegistry, grace: Duration, original: u32) -> ! {
    let reclaimed = registry.cleanup(grace);
    warn!(original_parent = original, reclaimed, "exiting after parent loss");
    std::process::exit(exit_codes::INTERRUPTED)
}

/// Windows has no reparenting signal; the watchdog holds a handle to the
/// parent process and blocks until it is signalled (the process exited).
#[cfg(windows)]
mod windows {
    use super::force_exit;
    use crate::process::SubprocessRegistry;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tracing::{debug, warn};
    use windows_sys::Win32::Foundation::{CloseHandle, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows_sys::Win32::System::Threading::{
        GetCurrentProcessId, INFINITE, OpenProcess, PROCESS_SYNCHRONIZE, WaitForSingleObject,
    };

    pub(super) fn start(registry: Arc<SubprocessRegistry>, grace: Duration) -> Option<JoinHandle<()>> {
        let Some(parent) = parent_pid() else {
            debug!("parent process unknown, watchdog disabled");
            return None;
        };

        // SAFETY: OpenProcess takes plain integers; a null return is handled.
        let handle = unsafe { OpenProcess(PROCESS_SYNCHRONIZE, 0, parent) };
        if handle.is_null() {
            warn!(parent, "parent process already gone");
            force_exit(&registry, grace, parent);
        }
        // Raw handles are not Send; carry the value across as an integer.
        let raw = handle as usize;

        let spawned = thread::Builder::new()
            .name("gui-agent-parent-watchdog".to_string())
            .spawn(move || {
                let handle = raw as _;
                // SAFETY: `handle` was opened above with SYNCHRONIZE access
                // and is only closed here.
                unsafe {
                    WaitForSingleObject(handle, INFINITE);
                    CloseHandle(handle);
                }
                warn!(original = parent, "parent process went away");
                force_exit(&registry, grace, parent);
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to start parent watchdog");
                None
            }
        }
    }

    /// Parent pid from a process snapshot; Windows has no `getppid`.
    fn parent_pid() -> Option<u32> {
        // SAFETY: the snapshot handle is checked and closed below, and the
        // entry is a plain-data struct sized before use.
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
            if snapshot == INVALID_HANDLE_VALUE {
                return None;
            }
            let me = GetCurrentProcessId();
            let mut entry: PROCESSENTRY32W = std::mem::zeroed();
            entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;

            let mut parent = None;
            let mut more = Process32FirstW(snapshot, &mut entry) != 0;
            while more {
                if entry.th32ProcessID == me {
                    parent = Some(entry.th32ParentProcessID).filter(|pid| *pid != 0);
                    break;
                }
                more = Process32NextW(snapshot, &mut entry) != 0;
            }
            CloseHandle(snapshot);
            parent
        }
    }
}
