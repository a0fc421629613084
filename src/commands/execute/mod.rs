//! Implementation of the `gui-agent execute` command.
//!
//! Flow:
//! 1. Reject in tap-only mode, validate flags and `--extra-info`
//! 2. Resolve and validate the provider, select the device
//! 3. Create a session (or mint a throwaway id in stateless mode)
//! 4. Start the task through the adapter under the operation deadline
//! 5. Collect post-action state and normalize it into a task record
//!
//! The session is created before the adapter runs so a failed or timed-out
//! call still leaves a session id the caller can inspect.

use super::{finish, parse_max_steps, record_timeout, reject};
use crate::adapter::prompt::{
    stateless_extra_info, stateless_max_steps, stateless_task, with_complete_guard,
};
use crate::adapter::StartRequest;
use crate::cli::ExecuteArgs;
use crate::context::AgentContext;
use crate::device::{DetailLevel, DeviceState};
use crate::error::{GuiAgentError, Result};
use crate::events::{Event, EventAction};
use crate::providers::validate_provider;
use crate::result::{FailureReport, SessionMode, TaskCall, TaskReport};
use crate::session::new_session_id;
use serde_json::{Map, Value, json};
use tracing::{info, warn};


const NO_PROVIDER: &str = "No provider configured for execute. Set --provider or configure \
     default_provider. If you only need coordinate control, use `tap`/`click`.";

pub fn cmd_execute(ctx: &mut AgentContext, args: ExecuteArgs) -> Value {
    finish(execute(ctx, args))
}

fn execute(ctx: &mut AgentContext, args: ExecuteArgs) -> std::result::Result<TaskReport, FailureReport> {
    if ctx.config.tap_only_mode {
        return Err(reject(GuiAgentError::TapOnlyMode("execute".to_string())));
    }
    let timeout = ctx.operation_timeout(args.timeout_sec).map_err(reject)?;
    let max_steps = parse_max_steps(args.max_steps).map_err(reject)?;
    let extra_info = parse_extra_info(args.extra_info.as_deref()).map_err(reject)?;

    let provider = args
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ctx.config.default_provider.trim())
        .to_string();
    if provider.is_empty() {
        return Err(reject(GuiAgentError::ProviderUnavailable(
            NO_PROVIDER.to_string(),
        )));
    }

    let mode = if args.stateless {
        SessionMode::Stateless
    } else {
        SessionMode::Stateful
    };
    let max_steps = max_steps.unwrap_or_else(|| match mode {
        SessionMode::Stateless => stateless_max_steps(ctx.config.default_max_steps),
        _ => ctx.config.default_max_steps,
    });

    validate_provider(&provider, &ctx.config).map_err(|e| {
        FailureReport::from_error(&e, Some("Provider validation failed")).with_provider(&provider)
    })?;
    let device_id = ctx
        .select_device(args.device_id.as_deref())
        .map_err(|e| FailureReport::from_error(&e, None).with_provider(&provider))?;

    let (session_id, request) = if args.stateless {
        let request = StartRequest {
            device_id: device_id.clone(),
            task: stateless_task(&args.task),
            max_steps,
            extra_info: Some(stateless_extra_info(extra_info)),
        };
        (new_session_id(), request)
    } else {
        let session = ctx
            .sessions
            .create(&device_id, &provider, &args.task)
            .map_err(|e| {
                FailureReport::from_error(&e, Some("Task execution failed"))
                    .with_provider(&provider)
                    .with_device(&device_id)
            })?;
        let request = StartRequest {
            device_id: device_id.clone(),
            task: with_complete_guard(&args.task),
            max_steps,
            extra_info,
        };
        (session.session_id, request)
    };
    info!(%session_id, %provider, %device_id, stateless = args.stateless, "starting task");

    let started = ctx.adapters.adapter(&provider).and_then(|adapter| {
        ctx.executor().run("execute", timeout, move || {
            adapter
                .start_task(&request)
                .map_err(|e| GuiAgentError::adapter(format!("{} adapter", adapter.name()), e))
        })
    });
    let raw = match started {
        Ok(raw) => raw,
        Err(e) => {
            record_timeout(ctx, &e, "execute", Some(&session_id));
            let mut report = FailureReport::from_error(&e, Some("Task execution failed"))
                .with_session_id(&session_id)
                .with_provider(&provider)
                .with_device(&device_id)
                .with_timeout(timeout);
            if args.stateless {
                report = report.with_mode(SessionMode::Stateless);
            }
            return Err(report);
        }
    };

    let state = post_action_state(ctx, &device_id);
    let observation = ctx.normalizer.observe(&session_id, Some(&args.task), state);
    let call = TaskCall {
        session_id: session_id.clone(),
        task: args.task,
        provider: provider.clone(),
        device_id: device_id.clone(),
        mode,
    };
    let report = ctx
        .normalizer
        .task_report(call, raw, observation, &mut ctx.sessions)
        .map_err(|e| {
            FailureReport::from_error(&e, Some("Task execution failed"))
                .with_session_id(&session_id)
                .with_provider(&provider)
                .with_device(&device_id)
        })?;

    ctx.events.record(
        Event::new(EventAction::Execute)
            .with_session(&session_id)
            .with_details(json!({
                "provider": provider,
                "device_id": device_id,
                "stateless": args.stateless,
                "next_action": report.next_action,
                "step_count": report.step_count,
            })),
    );
    Ok(report)
}

/// Parse `--extra-info`, which must be a JSON object.
pub(crate) fn parse_extra_info(raw: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(GuiAgentError::InvalidArgument(
            "Invalid --extra-info JSON: must be an object".to_string(),
        )),
        Err(e) => Err(GuiAgentError::InvalidArgument(format!(
            "Invalid --extra-info JSON: {}",
            e
        ))),
    }
}

/// Snapshot after the adapter ran. A failed collection still yields a
/// result, just without state.
pub(crate) fn post_action_state(ctx: &AgentContext, device_id: &str) -> DeviceState {
    ctx.collector
        .get_state(device_id, DetailLevel::Snapshot)
        .unwrap_or_else(|e| {
            warn!(error = %format!("{:#}", e), device_id, "post-action state collection failed");
            DeviceState::empty()
        })
}
