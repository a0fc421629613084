//! Command implementations for gui-agent.
//!
//! Every handler produces exactly one JSON record. Failures are shaped into
//! `success: false` records here and never propagate past this module.

mod continue_task;
mod devices;
mod execute;
mod providers;
mod sessions;
mod status;
mod tap;

use crate::cli::Command;
use crate::config::Config;
use crate::context::AgentContext;
use crate::error::{GuiAgentError, Result};
use crate::events::{Event, EventAction};
use crate::process::SubprocessRegistry;
use crate::result::FailureReport;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

/// Run one command against the loaded configuration.
///
/// `providers` stays usable when the config failed to load; every other
/// command reports the config error instead.
pub fn run(command: Command, config: Result<Config>, registry: Arc<SubprocessRegistry>) -> Value {
    if let Command::Providers = command {
        return match &config {
            Ok(config) => providers::cmd_providers(Some(config), None),
            Err(e) => providers::cmd_providers(None, Some(&e.to_string())),
        };
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => return failure(&e, None),
    };
    match AgentContext::from_config(config, registry) {
        Ok(mut ctx) => dispatch(&mut ctx, command),
        Err(e) => failure(&e, None),
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(ctx: &mut AgentContext, command: Command) -> Value {
    match command {
        Command::Execute(args) => execute::cmd_execute(ctx, args),
        Command::Continue(args) => continue_task::cmd_continue(ctx, args),
        Command::Status(args) => status::cmd_status(ctx, args),
        Command::Tap(args) => tap::cmd_tap(ctx, args),
        Command::Devices => devices::cmd_devices(ctx),
        Command::Sessions(args) => sessions::cmd_sessions(ctx, args),
        Command::Providers => providers::cmd_providers(Some(&ctx.config), None),
    }
}

/// Serialize a result record.
pub(crate) fn record<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "failed to serialize result record");
        json!({
            "success": false,
            "error": "io_error",
            "message": format!("failed to serialize result: {}", e),
        })
    })
}

pub(crate) fn failure(err: &GuiAgentError, context: Option<&str>) -> Value {
    record(&FailureReport::from_error(err, context))
}

/// Collapse a handler outcome into its record.
pub(crate) fn finish<T: Serialize>(outcome: std::result::Result<T, FailureReport>) -> Value {
    match outcome {
        Ok(report) => record(&report),
        Err(report) => record(&report),
    }
}

/// Failure record for an argument or precondition error, without context.
pub(crate) fn reject(err: GuiAgentError) -> FailureReport {
    FailureReport::from_error(&err, None)
}

/// Validate `--max-steps`. `None` means "use the default".
pub(crate) fn parse_max_steps(flag: Option<i64>) -> Result<Option<u32>> {
    match flag {
        None => Ok(None),
        Some(n) if n <= 0 => Err(GuiAgentError::InvalidArgument(
            "Invalid --max-steps: must be > 0".to_string(),
        )),
        Some(n) => Ok(Some(u32::try_from(n).unwrap_or(u32::MAX))),
    }
}

/// Log a timed-out operation to the audit log.
pub(crate) fn record_timeout(
    ctx: &AgentContext,
    err: &GuiAgentError,
    operation: &str,
    session_id: Option<&str>,
) {
    if !err.is_timeout() {
        return;
    }
    let mut event = Event::new(EventAction::Timeout).with_details(json!({
        "operation": operation,
        "terminated_subprocesses": err.reclaimed().unwrap_or(0),
    }));
    if let Some(session_id) = session_id {
        event = event.with_session(session_id);
    }
    ctx.events.record(event);
}
