//! Audit event log for gui-agent.
//!
//! Every invocation that touches a device or the session store appends one
//! NDJSON line (one JSON object per line) to `events.path`, by default
//! `~/.gui_agent_skill/events.ndjson`.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`execute`, `continue`, `tap`, `timeout`, ...)
//! - `actor`: the owner string (e.g., `user@HOST`)
//! - `session`: optional session id
//! - `details`: freeform object with action-specific details
//!
//! The log is best-effort: [`EventLog::record`] logs append failures and
//! never fails the command that produced the event.

use crate::config::EventsConfig;
use crate::error::{GuiAgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Task started through an adapter
    Execute,
    /// Session continued
    Continue,
    /// Direct coordinate tap
    Tap,
    /// An operation hit its deadline
    Timeout,
    /// The operator interrupted the invocation
    Interrupted,
    /// Stale sessions purged
    Purge,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Execute => write!(f, "execute"),
            EventAction::Continue => write!(f, "continue"),
            EventAction::Tap => write!(f, "tap"),
            EventAction::Timeout => write!(f, "timeout"),
            EventAction::Interrupted => write!(f, "interrupted"),
            EventAction::Purge => write!(f, "purge"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub details: Value,
}

impl Event {
    /// New event stamped now, with the actor taken from the environment.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            session: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session = Some(session_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GuiAgentError::Io(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// `USER@HOST`, with `unknown` for whichever part cannot be determined.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append `event` as one line to `path`, creating the file and its parent.
pub fn append_event(path: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            GuiAgentError::Io(format!(
                "failed to create events directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            GuiAgentError::Io(format!(
                "failed to open events file '{}': {}",
                path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        GuiAgentError::Io(format!(
            "failed to write event to '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        GuiAgentError::Io(format!(
            "failed to sync events file '{}': {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Configured destination for audit events.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn from_config(config: &EventsConfig) -> Self {
        Self {
            path: config.enabled.then(|| config.resolved_path()),
        }
    }

    /// A log that drops every event.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `event`, logging instead of failing when the write does not succeed.
    pub fn record(&self, event: Event) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_event(path, &event) {
            warn!(action = %event.action, error = %e, "failed to append audit event");
        }
    }
}
