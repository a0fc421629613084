//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for gui-agent, read from `config.yaml`.
///
/// Unknown fields are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Execution defaults
    // =========================================================================
    /// Provider used when `--provider` is omitted.
    #[serde(default = "default_provider_name")]
    pub default_provider: String,

    /// Disable `execute`/`continue`; only direct coordinate taps are allowed.
    pub tap_only_mode: bool,

    /// Device used when `--device-id` is omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_device_id: Option<String>,

    #[serde(default = "default_max_steps")]
    pub default_max_steps: u32,

    /// Deadline applied when `--timeout-sec` is omitted. None means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_operation_timeout_sec: Option<i64>,

    /// Grace period between the graceful and forced termination passes.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,

    // =========================================================================
    // Adapters
    // =========================================================================
    /// Bridge command used for providers without their own `command`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_command: Option<String>,

    pub providers: BTreeMap<String, ProviderConfig>,

    // =========================================================================
    // Storage and devices
    // =========================================================================
    pub session: SessionConfig,
    pub output: OutputConfig,
    pub device: DeviceConfig,
    pub events: EventsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider_name(),
            tap_only_mode: false,
            default_device_id: None,
            default_max_steps: default_max_steps(),
            default_operation_timeout_sec: None,
            cleanup_grace_ms: default_cleanup_grace_ms(),
            adapter_command: None,
            providers: BTreeMap::new(),
            session: SessionConfig::default(),
            output: OutputConfig::default(),
            device: DeviceConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.expire_seconds)
    }

    /// Configured default device, ignoring blank values.
    pub fn default_device(&self) -> Option<&str> {
        self.default_device_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
