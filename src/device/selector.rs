//! Device selection.
//!
//! Precedence is fixed: an explicit `--device-id`, then the configured
//! `default_device_id`, then the sole connected device.

use crate::error::{DeviceIssue, GuiAgentError, Result};

/// Pick the device an operation should target.
pub fn select_device(
    explicit: Option<&str>,
    configured_default: Option<&str>,
    connected: &[String],
) -> Result<String> {
    let requested = explicit
        .filter(|id| !id.trim().is_empty())
        .or_else(|| configured_default.filter(|id| !id.trim().is_empty()));

    if let Some(id) = requested {
        ensure_connected(id, connected)?;
        return Ok(id.to_string());
    }

    match connected {
        [] => Err(unavailable(DeviceIssue::NoDevices, connected)),
        [only] => Ok(only.clone()),
        _ => Err(unavailable(DeviceIssue::Ambiguous, connected)),
    }
}

/// Fail unless `device_id` is among the connected devices.
pub fn ensure_connected(device_id: &str, connected: &[String]) -> Result<()> {
    if connected.is_empty() {
        return Err(unavailable(DeviceIssue::NoDevices, connected));
    }
    if !connected.iter().any(|d| d == device_id) {
        return Err(unavailable(
            DeviceIssue::NotConnected(device_id.to_string()),
            connected,
        ));
    }
    Ok(())
}

fn unavailable(issue: DeviceIssue, connected: &[String]) -> GuiAgentError {
    GuiAgentError::DeviceUnavailable {
        issue,
        devices: connected.to_vec(),
    }
}
