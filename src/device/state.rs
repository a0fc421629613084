//! Device state snapshots returned by collectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much state a collector should gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Foreground app and notifications only.
    Lite,
    /// Lite plus a screenshot.
    Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

/// A base64-encoded screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub b64: String,
    pub content_type: String,
}

impl Screenshot {
    pub fn png(b64: impl Into<String>) -> Self {
        Self {
            b64: b64.into(),
            content_type: "image/png".to_string(),
        }
    }
}

/// Snapshot of what the device is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub current_app: Option<String>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
    pub timestamp: DateTime<Utc>,
}

impl DeviceState {
    /// State with nothing known, stamped now.
    pub fn empty() -> Self {
        Self {
            current_app: None,
            notifications: Vec::new(),
            screenshot: None,
            timestamp: Utc::now(),
        }
    }

    pub fn screenshot_b64(&self) -> Option<&str> {
        self.screenshot
            .as_ref()
            .map(|s| s.b64.as_str())
            .filter(|b64| !b64.is_empty())
    }
}

/// Output of a raw device command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
}
