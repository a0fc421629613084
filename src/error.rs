//! Error types for gui-agent.
//!
//! Uses thiserror for derive macros. Every variant maps to a short error code
//! (surfaced in the `error` field of failure records) and carries a message
//! that tells the operator what to do next.

use crate::exit_codes;
use crate::session::SessionStatus;
use thiserror::Error;

/// Hint appended whenever no usable device can be found.
pub const NO_DEVICE_HINT: &str = "Connect a phone/emulator, enable USB debugging, \
     and approve the debugging authorization prompt on the device. \
     You can run `adb devices` to verify.";

/// Why device selection failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIssue {
    /// Nothing is connected.
    NoDevices,
    /// More than one device is connected and none was named.
    Ambiguous,
    /// The named device is not in the connected list.
    NotConnected(String),
}

/// Main error type for gui-agent operations.
#[derive(Error, Debug)]
pub enum GuiAgentError {
    /// Caller supplied a value that can never succeed (bad timeout, bad coordinates, ...).
    #[error("{0}")]
    InvalidArgument(String),

    /// No device could be selected for the operation.
    #[error("{}", describe_device_issue(.issue, .devices))]
    DeviceUnavailable {
        issue: DeviceIssue,
        /// Devices connected at the time of the failure.
        devices: Vec<String>,
    },

    /// The session id is unknown to the store.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session exists but has reached a terminal status.
    #[error("Cannot continue session {session_id}: status is {status}.")]
    SessionNotActive {
        session_id: String,
        status: SessionStatus,
    },

    /// The operation did not finish within its deadline.
    #[error("{operation} timed out after {timeout_secs} seconds.")]
    OperationTimeout {
        operation: String,
        timeout_secs: f64,
        /// Tracked subprocesses terminated by the timeout cleanup.
        reclaimed: usize,
    },

    /// The operator aborted the invocation (SIGINT/SIGTERM).
    #[error("Execution interrupted by user; task stopped.")]
    Interrupted {
        /// Tracked subprocesses terminated by the interrupt cleanup.
        reclaimed: usize,
    },

    /// An external collaborator (adapter, collector, captioner) failed.
    #[error("{context}: {message}")]
    AdapterFailure { context: String, message: String },

    /// Task execution is disabled by configuration.
    #[error(
        "`{0}` is unavailable in tap-only mode. Use `tap`/`click` for coordinate control, \
         or configure a model provider to enable planner mode."
    )]
    TapOnlyMode(String),

    /// The requested provider cannot be used.
    #[error("{0}")]
    ProviderUnavailable(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem or process I/O failed.
    #[error("{0}")]
    Io(String),
}

impl GuiAgentError {
    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            GuiAgentError::InvalidArgument(_) => "invalid_argument",
            GuiAgentError::DeviceUnavailable { .. } => "device_unavailable",
            GuiAgentError::SessionNotFound(_) => "session_not_found",
            GuiAgentError::SessionNotActive { .. } => "session_not_active",
            GuiAgentError::OperationTimeout { .. } => "operation_timeout",
            GuiAgentError::Interrupted { .. } => "interrupted",
            GuiAgentError::AdapterFailure { .. } => "adapter_failure",
            GuiAgentError::TapOnlyMode(_) => "tap_only_mode_enabled",
            GuiAgentError::ProviderUnavailable(_) => "provider_unavailable",
            GuiAgentError::Config(_) => "config_error",
            GuiAgentError::Io(_) => "io_error",
        }
    }

    /// Process exit code for an invocation that ended in this error.
    ///
    /// Every structured failure exits with [`exit_codes::FAILURE`]; only the
    /// parent watchdog uses [`exit_codes::INTERRUPTED`].
    pub fn exit_code(&self) -> i32 {
        exit_codes::FAILURE
    }

    /// Wrap a collaborator error with context, keeping its full cause chain.
    pub fn adapter(context: impl Into<String>, err: anyhow::Error) -> Self {
        GuiAgentError::AdapterFailure {
            context: context.into(),
            message: format!("{:#}", err),
        }
    }

    /// Number of subprocesses reclaimed while producing this error, if any.
    pub fn reclaimed(&self) -> Option<usize> {
        match self {
            GuiAgentError::OperationTimeout { reclaimed, .. }
            | GuiAgentError::Interrupted { reclaimed } => Some(*reclaimed),
            _ => None,
        }
    }

    /// Whether this error represents an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GuiAgentError::OperationTimeout { .. })
    }
}

fn describe_device_issue(issue: &DeviceIssue, devices: &[String]) -> String {
    match issue {
        DeviceIssue::NoDevices => format!("No ADB devices found. {}", NO_DEVICE_HINT),
        DeviceIssue::Ambiguous => format!(
            "Multiple devices found ({} candidates): {}. Use --device-id to choose one.",
            devices.len(),
            devices.join(", ")
        ),
        DeviceIssue::NotConnected(id) if devices.is_empty() => format!(
            "Device `{}` is not connected or not authorized. No ADB devices found. {}",
            id, NO_DEVICE_HINT
        ),
        DeviceIssue::NotConnected(id) => format!(
            "Device `{}` is not connected or not authorized. Available devices: {}. \
             Ensure USB debugging is enabled and debugging authorization is approved on the device.",
            id,
            devices.join(", ")
        ),
    }
}

/// Result type alias for gui-agent operations.
pub type Result<T> = std::result::Result<T, GuiAgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case_and_distinct() {
        let errors = [
            GuiAgentError::InvalidArgument("x".into()),
            GuiAgentError::DeviceUnavailable {
                issue: DeviceIssue::NoDevices,
                devices: vec![],
            },
            GuiAgentError::SessionNotFound("abc".into()),
            GuiAgentError::SessionNotActive {
                session_id: "abc".into(),
                status: SessionStatus::Completed,
            },
            GuiAgentError::OperationTimeout {
                operation: "execute".into(),
                timeout_secs: 5.0,
                reclaimed: 0,
            },
            GuiAgentError::Interrupted { reclaimed: 0 },
            GuiAgentError::AdapterFailure {
                context: "c".into(),
                message: "m".into(),
            },
            GuiAgentError::TapOnlyMode("execute".into()),
            GuiAgentError::ProviderUnavailable("p".into()),
            GuiAgentError::Config("c".into()),
            GuiAgentError::Io("io".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        for code in &codes {
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn interrupts_and_timeouts_exit_as_failures() {
        assert_eq!(GuiAgentError::Interrupted { reclaimed: 2 }.exit_code(), exit_codes::FAILURE);
        let timeout = GuiAgentError::OperationTimeout {
            operation: "tap".into(),
            timeout_secs: 1.0,
            reclaimed: 0,
        };
        assert_eq!(timeout.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn ambiguous_devices_lists_every_candidate() {
        let err = GuiAgentError::DeviceUnavailable {
            issue: DeviceIssue::Ambiguous,
            devices: vec!["emulator-5554".into(), "R58M123".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 candidates"));
        assert!(msg.contains("emulator-5554"));
        assert!(msg.contains("R58M123"));
    }

    #[test]
    fn timeout_message_and_reclaimed_count() {
        let err = GuiAgentError::OperationTimeout {
            operation: "execute".into(),
            timeout_secs: 5.0,
            reclaimed: 2,
        };
        assert_eq!(err.to_string(), "execute timed out after 5 seconds.");
        assert_eq!(err.reclaimed(), Some(2));
        assert!(err.is_timeout());
        assert!(!GuiAgentError::Interrupted { reclaimed: 1 }.is_timeout());
    }

    #[test]
    fn adapter_wrapping_keeps_cause_chain() {
        let inner = anyhow::anyhow!("connection refused").context("http adapter");
        let err = GuiAgentError::adapter("Task execution failed", inner);
        assert_eq!(
            err.to_string(),
            "Task execution failed: http adapter: connection refused"
        );
    }

    #[test]
    fn session_not_active_mentions_status() {
        let err = GuiAgentError::SessionNotActive {
            session_id: "ab12cd34".into(),
            status: SessionStatus::Expired,
        };
        assert!(err.to_string().contains("status is expired"));
    }
}
