//! Deadline-bounded execution of device operations.
//!
//! An operation runs on a dedicated worker thread and the caller waits on a
//! channel with `recv_timeout`. When the deadline passes the worker is
//! abandoned (threads cannot be killed) and every subprocess it may have
//! spawned is reclaimed through the [`SubprocessRegistry`].

use crate::error::{GuiAgentError, Result};
use crate::process::SubprocessRegistry;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs operations under an optional deadline.
#[derive(Debug, Clone)]
pub struct TimeoutExecutor {
    registry: Arc<SubprocessRegistry>,
    grace: Duration,
}

impl TimeoutExecutor {
    pub fn new(registry: Arc<SubprocessRegistry>, grace: Duration) -> Self {
        Self { registry, grace }
    }

    /// Run `op`, bounded by `timeout` when one is given.
    ///
    /// - `None`: runs synchronously on the calling thread.
    /// - zero: rejected before any work starts.
    /// - otherwise: runs on a worker named `gui-agent-{name}-runner`; on
    ///   expiry the registry is cleaned up and [`GuiAgentError::OperationTimeout`]
    ///   is returned. A late outcome from the worker is dropped.
    pub fn run<T, F>(&self, name: &str, timeout: Option<Duration>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(timeout) = timeout else {
            return op();
        };
        if timeout.is_zero() {
            return Err(GuiAgentError::InvalidArgument(
                "timeout_sec must be greater than 0.".to_string(),
            ));
        }

        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name(format!("gui-agent-{}-runner", name))
            .spawn(move || {
                // The receiver is gone once the deadline has passed.
                let _ = tx.send(op());
            })
            .map_err(|e| GuiAgentError::Io(format!("failed to start {} worker: {}", name, e)))?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                let reclaimed = self.registry.cleanup(self.grace);
                warn!(operation = name, ?timeout, reclaimed, "operation timed out");
                Err(GuiAgentError::OperationTimeout {
                    operation: name.to_string(),
                    timeout_secs: timeout.as_secs_f64(),
                    reclaimed,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!(operation = name, "worker exited without an outcome");
                Err(GuiAgentError::AdapterFailure {
                    context: name.to_string(),
                    message: format!("{} failed without returning a result.", name),
                })
            }
        }
    }
}

/// Validate a user-supplied timeout in whole seconds.
pub fn timeout_from_secs(secs: Option<i64>) -> Result<Option<Duration>> {
    match secs {
        None => Ok(None),
        Some(s) if s <= 0 => Err(GuiAgentError::InvalidArgument(
            "Invalid --timeout-sec: must be > 0".to_string(),
        )),
        Some(s) => Ok(Some(Duration::from_secs(s.unsigned_abs()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn executor() -> TimeoutExecutor {
        TimeoutExecutor::new(Arc::new(SubprocessRegistry::new()), Duration::from_millis(200))
    }

    #[test]
    fn no_timeout_runs_inline() {
        let caller = thread::current().id();
        let ran_on = executor()
            .run("execute", None, move || Ok(thread::current().id()))
            .unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn no_timeout_propagates_failure_unchanged() {
        let err = executor()
            .run::<(), _>("execute", None, || {
                Err(GuiAgentError::SessionNotFound("ab12cd34".into()))
            })
            .unwrap_err();
        assert!(matches!(err, GuiAgentError::SessionNotFound(id) if id == "ab12cd34"));
    }

    #[test]
    fn zero_timeout_rejected_before_work_starts() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let err = executor()
            .run("execute", Some(Duration::ZERO), move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.code(), "invalid_argument");
        thread::sleep(Duration::from_millis(50));
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn fast_operation_returns_its_value() {
        let value = executor()
            .run("tap", Some(Duration::from_secs(5)), || Ok(42))
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn fast_operation_failure_is_propagated() {
        let err = executor()
            .run::<(), _>("tap", Some(Duration::from_secs(5)), || {
                Err(GuiAgentError::InvalidArgument("bad".into()))
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn slow_operation_times_out() {
        let err = executor()
            .run("execute", Some(Duration::from_millis(50)), || {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.reclaimed(), Some(0));
        assert!(err.to_string().starts_with("execute timed out after"));
    }

    #[test]
    fn panicking_worker_reports_missing_result() {
        let err = executor()
            .run::<(), _>("continue", Some(Duration::from_secs(5)), || {
                panic!("adapter blew up")
            })
            .unwrap_err();
        assert_eq!(err.code(), "adapter_failure");
        assert!(err.to_string().contains("continue failed without returning a result."));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_reclaims_spawned_subprocesses() {
        use crate::process::run_tracked;
        use std::process::Command;

        let registry = Arc::new(SubprocessRegistry::new());
        let executor = TimeoutExecutor::new(Arc::clone(&registry), Duration::from_secs(2));
        let worker_registry = Arc::clone(&registry);

        let err = executor
            .run("execute", Some(Duration::from_secs(1)), move || {
                let mut command = Command::new("sh");
                command.args(["-c", "sleep 30"]);
                run_tracked(&worker_registry, command, None)
                    .map_err(|e| GuiAgentError::adapter("spawn", e))
            })
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.reclaimed(), Some(1));
        assert!(registry.collect_live().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn finished_bridge_with_background_helper_returns_before_deadline() {
        use crate::process::run_tracked;
        use std::process::Command;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("(sleep 3; touch '{}') & echo '{{}}'", marker.display());
        let registry = Arc::new(SubprocessRegistry::new());
        let executor = TimeoutExecutor::new(Arc::clone(&registry), Duration::from_secs(1));
        let worker_registry = Arc::clone(&registry);

        let output = executor
            .run("execute", Some(Duration::from_secs(10)), move || {
                let mut command = Command::new("sh");
                command.args(["-c", &script]);
                run_tracked(&worker_registry, command, None)
                    .map_err(|e| GuiAgentError::adapter("spawn", e))
            })
            .unwrap();

        assert_eq!(output.stdout_text(), "{}\n");
        assert_eq!(registry.cleanup(Duration::from_secs(1)), 0);
        thread::sleep(Duration::from_secs(4));
        assert!(!marker.exists());
    }

    #[test]
    fn timeout_from_secs_validates() {
        assert_eq!(timeout_from_secs(None).unwrap(), None);
        assert_eq!(
            timeout_from_secs(Some(5)).unwrap(),
            Some(Duration::from_secs(5))
        );
        assert!(timeout_from_secs(Some(0)).is_err());
        assert!(timeout_from_secs(Some(-3)).is_err());
    }
}
