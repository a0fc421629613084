//! Implementation of the `gui-agent devices` command.

use super::failure;
use crate::context::AgentContext;
use crate::error::NO_DEVICE_HINT;
use serde_json::{Value, json};

pub fn cmd_devices(ctx: &AgentContext) -> Value {
    let devices = match ctx.connected_devices() {
        Ok(devices) => devices,
        Err(e) => return failure(&e, None),
    };

    if devices.is_empty() {
        return json!({
            "success": false,
            "devices": [],
            "count": 0,
            "error": "device_unavailable",
            "message": format!("No ADB devices found. {}", NO_DEVICE_HINT),
        });
    }

    json!({
        "success": true,
        "count": devices.len(),
        "devices": devices,
    })
}
