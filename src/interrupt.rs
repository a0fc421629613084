//! Operator interrupts (SIGINT/SIGTERM, console Ctrl-C/Ctrl-Break on Windows).
//!
//! The command runs on a worker thread while the main thread waits for
//! either its record or a signal. A signal reclaims every tracked
//! subprocess and resolves the invocation as interrupted; the abandoned
//! worker is torn down when the process exits.

use crate::process::SubprocessRegistry;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How a guarded command ended.
#[derive(Debug)]
pub enum Guarded<T> {
    Completed(T),
    /// A signal arrived first; `reclaimed` subprocesses were terminated.
    Interrupted { signal: i32, reclaimed: usize },
    /// The command thread died without producing a record.
    Panicked { reclaimed: usize },
}

enum Message<T> {
    Done(T),
    Panicked,
    Signal(i32),
}

/// Run `command` so that SIGINT/SIGTERM (Ctrl-C/Ctrl-Break on Windows)
/// interrupt it.
///
/// Falls back to running inline when the signal listener cannot be
/// installed.
pub fn run_guarded<T, F>(registry: Arc<SubprocessRegistry>, grace: Duration, command: F) -> Guarded<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match listen_for_signals() {
        Ok(signals) => run_guarded_with(registry, grace, signals, command),
        Err(e) => {
            warn!(error = %e, "signal listener unavailable, running without interrupt handling");
            Guarded::Completed(command())
        }
    }
}

/// Run `command`, treating the first value received on `signals` as an
/// interrupt.
pub fn run_guarded_with<T, F>(
    registry: Arc<SubprocessRegistry>,
    grace: Duration,
    signals: mpsc::Receiver<i32>,
    command: F,
) -> Guarded<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Message<T>>();

    let forward = tx.clone();
    let listener = thread::Builder::new()
        .name("gui-agent-interrupts".to_string())
        .spawn(move || {
            if let Ok(signal) = signals.recv() {
                debug!(signal, "received interrupt");
                let _ = forward.send(Message::Signal(signal));
            }
        });
    if let Err(e) = listener {
        warn!(error = %e, "failed to start interrupt listener, running without interrupt handling");
        return Guarded::Completed(command());
    }

    let worker = thread::Builder::new()
        .name("gui-agent-command".to_string())
        .spawn(move || {
            let message = match panic::catch_unwind(AssertUnwindSafe(command)) {
                Ok(value) => Message::Done(value),
                Err(_) => Message::Panicked,
            };
            let _ = tx.send(message);
        });
    if let Err(e) = worker {
        warn!(error = %e, "failed to start command worker");
        return Guarded::Panicked {
            reclaimed: registry.cleanup(grace),
        };
    }

    match rx.recv() {
        Ok(Message::Done(value)) => Guarded::Completed(value),
        Ok(Message::Signal(signal)) => {
            let reclaimed = registry.cleanup(grace);
            warn!(signal, reclaimed, "interrupted, subprocesses reclaimed");
            Guarded::Interrupted { signal, reclaimed }
        }
        Ok(Message::Panicked) | Err(_) => Guarded::Panicked {
            reclaimed: registry.cleanup(grace),
        },
    }
}

#[cfg(unix)]
fn listen_for_signals() -> std::io::Result<mpsc::Receiver<i32>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("gui-agent-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                if tx.send(signal).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Console control events, reported with the POSIX numbers of the matching
/// signals (SIGINT for Ctrl-C, SIGBREAK for Ctrl-Break).
#[cfg(windows)]
fn listen_for_signals() -> std::io::Result<mpsc::Receiver<i32>> {
    use std::sync::{Mutex, OnceLock};
    use windows_sys::Win32::Foundation::BOOL;
    use windows_sys::Win32::System::Console::{
        CTRL_BREAK_EVENT, CTRL_C_EVENT, SetConsoleCtrlHandler,
    };

    const SIGINT: i32 = 2;
    const SIGBREAK: i32 = 21;

    static EVENTS: OnceLock<Mutex<mpsc::Sender<i32>>> = OnceLock::new();

    unsafe extern "system" fn on_console_event(kind: u32) -> BOOL {
        let signal = match kind {
            CTRL_C_EVENT => SIGINT,
            CTRL_BREAK_EVENT => SIGBREAK,
            _ => return 0,
        };
        match EVENTS.get() {
            Some(events) => {
                let sent = events
                    .lock()
                    .map(|tx| tx.send(signal).is_ok())
                    .unwrap_or(false);
                i32::from(sent)
            }
            None => 0,
        }
    }

    let (tx, rx) = mpsc::channel();
    if EVENTS.set(Mutex::new(tx)).is_err() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "console control handler already installed",
        ));
    }
    // SAFETY: the handler only touches a process-wide static and is never
    // removed.
    if unsafe { SetConsoleCtrlHandler(Some(on_console_event), 1) } == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(rx)
}

#[cfg(not(any(unix, windows)))]
fn listen_for_signals() -> std::io::Result<mpsc::Receiver<i32>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "interrupt handling is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_command_returns_its_value() {
        let registry = Arc::new(SubprocessRegistry::new());
        match run_guarded(registry, Duration::from_millis(10), || 42) {
            Guarded::Completed(value) => assert_eq!(value, 42),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn panicking_command_is_reported() {
        let registry = Arc::new(SubprocessRegistry::new());
        let outcome = run_guarded(registry, Duration::from_millis(10), || -> u32 {
            panic!("worker failure")
        });
        assert!(matches!(outcome, Guarded::Panicked { reclaimed: 0 }));
    }

    #[cfg(unix)]
    #[test]
    fn signal_reclaims_subprocesses_and_reports_interrupt() {
        use crate::process::TrackedProcess;
        use std::process::{Command, Stdio};

        let registry = Arc::new(SubprocessRegistry::new());
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        registry.register(TrackedProcess::new(child));

        let (signal_tx, signals) = mpsc::channel();
        let (release_tx, release) = mpsc::channel::<()>();
        signal_tx.send(libc::SIGINT).unwrap();

        let outcome = run_guarded_with(
            Arc::clone(&registry),
            Duration::from_secs(2),
            signals,
            move || {
                let _ = release.recv();
                7
            },
        );

        match outcome {
            Guarded::Interrupted { signal, reclaimed } => {
                assert_eq!(signal, libc::SIGINT);
                assert_eq!(reclaimed, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(registry.collect_live().is_empty());
        drop(release_tx);
    }

    #[test]
    fn command_finishing_first_ignores_later_signals() {
        let registry = Arc::new(SubprocessRegistry::new());
        let (signal_tx, signals) = mpsc::channel();

        let outcome = run_guarded_with(registry, Duration::from_millis(10), signals, || "done");

        assert!(matches!(outcome, Guarded::Completed("done")));
        let _ = signal_tx.send(15);
    }
}
