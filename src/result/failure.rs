//! Structured failure records.

use super::SessionMode;
use crate::error::{DeviceIssue, GuiAgentError};
use crate::session::SessionStatus;
use serde::Serialize;
use std::time::Duration;

/// Commands that stay available in tap-only mode.
pub const TAP_ONLY_ALLOWED: [&str; 4] = ["tap", "click", "status", "devices"];

/// A `success: false` record.
///
/// `error` is the short error code; `message` is the human explanation.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub error: String,
    pub message: String,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_subprocesses: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<f64>,
    /// Connected devices, when device selection failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_mode: Option<SessionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_persisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<&'static str>>,
}

impl FailureReport {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            provider: None,
            device_id: None,
            error: code.into(),
            message: message.into(),
            timed_out: false,
            interrupted: None,
            terminated_subprocesses: None,
            timeout_sec: None,
            devices: None,
            session_status: None,
            session_mode: None,
            session_persisted: None,
            continuation_supported: None,
            allowed_commands: None,
        }
    }

    /// Record for `err`, with `context` prefixed to its message.
    ///
    /// Interrupts, tap-only rejections and device selection failures keep
    /// their own message since it already says what happened.
    pub fn from_error(err: &GuiAgentError, context: Option<&str>) -> Self {
        let message = match (err, context) {
            (
                GuiAgentError::Interrupted { .. }
                | GuiAgentError::TapOnlyMode(_)
                | GuiAgentError::DeviceUnavailable { .. },
                _,
            )
            | (_, None) => err.to_string(),
            (_, Some(context)) => format!("{}: {}", context, err),
        };

        let mut report = Self::new(err.code(), message);
        report.timed_out = err.is_timeout();
        report.terminated_subprocesses = err.reclaimed();

        match err {
            GuiAgentError::Interrupted { .. } => report.interrupted = Some(true),
            GuiAgentError::DeviceUnavailable { issue, devices } => {
                report.devices = Some(devices.clone());
                if let DeviceIssue::NotConnected(id) = issue {
                    report.device_id = Some(id.clone());
                }
            }
            GuiAgentError::SessionNotActive { session_id, status } => {
                report.session_id = Some(session_id.clone());
                report.session_status = Some(*status);
            }
            GuiAgentError::TapOnlyMode(_) => {
                report = report.with_mode(SessionMode::DirectCoordinateOnly);
                report.allowed_commands = Some(TAP_ONLY_ALLOWED.to_vec());
            }
            _ => {}
        }
        report
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Record the deadline the failed operation ran under.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_sec = timeout.map(|t| t.as_secs_f64());
        self
    }

    /// Mark the record as not backed by a persisted, continuable session.
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = Some(mode);
        self.session_persisted = Some(mode.is_persisted());
        self.continuation_supported = Some(mode.is_persisted());
        self
    }
}
