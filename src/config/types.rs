//! Configuration sections and default value functions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the per-user state directory under `$HOME`.
pub const STATE_DIR_NAME: &str = ".gui_agent_skill";

/// `~/.gui_agent_skill`, or a relative `.gui_agent_skill` when there is no home.
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding one `<session_id>.json` per session.
    pub storage_dir: PathBuf,
    /// Seconds of inactivity after which a session expires.
    pub expire_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_session_dir(),
            expire_seconds: default_expire_seconds(),
        }
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Screenshots land in `<dir>/<session_id>/screenshot.png`.
    pub dir: PathBuf,
    pub save_screenshot: bool,
    pub enable_caption: bool,
    /// Command that turns `{task, screenshot_b64}` on stdin into a caption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_command: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save_screenshot: true,
            enable_caption: true,
            caption_command: None,
        }
    }
}

/// Per-provider overrides. Every field is optional; the built-in catalog
/// fills in the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Adapter bridge command template for this provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl ProviderConfig {
    /// Configured API key, trimmed, if non-empty.
    pub fn configured_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Device access settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub adb_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
        }
    }
}

/// Audit event log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub enabled: bool,
    /// Defaults to `~/.gui_agent_skill/events.ndjson`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl EventsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| state_dir().join("events.ndjson"))
    }
}

// Default value functions for serde

pub fn default_provider_name() -> String {
    "local".to_string()
}

pub fn default_max_steps() -> u32 {
    20
}

pub fn default_cleanup_grace_ms() -> u64 {
    1500
}

pub fn default_expire_seconds() -> u64 {
    3600
}

pub fn default_session_dir() -> PathBuf {
    state_dir().join("sessions")
}

pub fn default_output_dir() -> PathBuf {
    state_dir().join("outputs")
}

pub fn default_adb_path() -> String {
    "adb".to_string()
}
