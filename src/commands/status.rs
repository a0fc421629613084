//! Implementation of the `gui-agent status` command.
//!
//! Reports the foreground app and the most recent notifications from a
//! lite state snapshot (no screenshot).

use crate::cli::StatusArgs;
use crate::context::AgentContext;
use crate::device::DetailLevel;
use crate::error::GuiAgentError;
use crate::result::FailureReport;
use serde_json::{Value, json};

/// Notifications included in the status record.
const MAX_NOTIFICATIONS: usize = 5;

pub fn cmd_status(ctx: &AgentContext, args: StatusArgs) -> Value {
    let device_id = match ctx.select_device(args.device_id.as_deref()) {
        Ok(device_id) => device_id,
        Err(e) => {
            let mut report = FailureReport::from_error(&e, None);
            // Always list what is connected; discovery errors leave it empty.
            if report.devices.is_none() {
                report.devices = Some(ctx.connected_devices().unwrap_or_default());
            }
            return super::record(&report);
        }
    };

    match ctx.collector.get_state(&device_id, DetailLevel::Lite) {
        Ok(state) => {
            let notifications: Vec<_> = state
                .notifications
                .into_iter()
                .take(MAX_NOTIFICATIONS)
                .collect();
            json!({
                "success": true,
                "device_id": device_id,
                "current_app": state.current_app,
                "notifications": notifications,
                "timestamp": state.timestamp,
            })
        }
        Err(e) => {
            let err = GuiAgentError::adapter("Device state collection failed", e);
            super::record(&FailureReport::from_error(&err, None).with_device(device_id))
        }
    }
}
