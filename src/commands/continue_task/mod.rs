//! Implementation of the `gui-agent continue` command.
//!
//! Resumes a persisted session, explicitly by id or the latest active one,
//! handing the adapter its own continuation token when the previous step
//! returned one.

use super::execute::post_action_state;
use super::{finish, parse_max_steps, record_timeout, reject};
use crate::adapter::ContinueRequest;
use crate::adapter::prompt::with_complete_guard;
use crate::cli::ContinueArgs;
use crate::context::AgentContext;
use crate::error::GuiAgentError;
use crate::events::{Event, EventAction};
use crate::result::{FailureReport, SessionMode, TaskCall, TaskReport};
use crate::session::Session;
use serde_json::{Value, json};
use tracing::info;


const NO_ACTIVE_SESSION: &str = "No active session to continue. Start a new task first.";

pub fn cmd_continue(ctx: &mut AgentContext, args: ContinueArgs) -> Value {
    finish(continue_session(ctx, args))
}

fn continue_session(
    ctx: &mut AgentContext,
    args: ContinueArgs,
) -> std::result::Result<TaskReport, FailureReport> {
    if ctx.config.tap_only_mode {
        return Err(reject(GuiAgentError::TapOnlyMode("continue".to_string())));
    }
    let timeout = ctx.operation_timeout(args.timeout_sec).map_err(reject)?;
    let max_steps = parse_max_steps(args.max_steps)
        .map_err(reject)?
        .unwrap_or(ctx.config.default_max_steps);

    let session = find_session(ctx, &args)?;
    if session.status.is_terminal() {
        return Err(reject(GuiAgentError::SessionNotActive {
            session_id: session.session_id,
            status: session.status,
        }));
    }

    let session_id = session.session_id.clone();
    let device_id = session.device_id.clone();
    let provider = session.provider.clone();
    let fail = |e: &GuiAgentError| {
        FailureReport::from_error(e, Some("Continue task failed"))
            .with_session_id(&session_id)
            .with_provider(&provider)
            .with_device(&device_id)
    };

    ctx.ensure_device_connected(&device_id).map_err(|e| fail(&e))?;

    let task = args.task.clone().unwrap_or_else(|| session.task.clone());
    let request = ContinueRequest {
        device_id: device_id.clone(),
        session_id: session.continuation_token(),
        reply: args.reply.clone(),
        task: with_complete_guard(&task),
        max_steps,
    };
    info!(%session_id, %provider, %device_id, step = session.step_count + 1, "continuing task");

    let continued = ctx.adapters.adapter(&provider).and_then(|adapter| {
        ctx.executor().run("continue", timeout, move || {
            adapter
                .continue_task(&request)
                .map_err(|e| GuiAgentError::adapter(format!("{} adapter", adapter.name()), e))
        })
    });
    let raw = match continued {
        Ok(raw) => raw,
        Err(e) => {
            record_timeout(ctx, &e, "continue", Some(&session_id));
            return Err(fail(&e).with_timeout(timeout));
        }
    };

    let state = post_action_state(ctx, &device_id);
    let observation = ctx.normalizer.observe(&session_id, Some(&task), state);
    let call = TaskCall {
        session_id: session_id.clone(),
        task,
        provider: provider.clone(),
        device_id: device_id.clone(),
        mode: SessionMode::Stateful,
    };
    let report = ctx
        .normalizer
        .task_report(call, raw, observation, &mut ctx.sessions)
        .map_err(|e| fail(&e))?;

    ctx.events.record(
        Event::new(EventAction::Continue)
            .with_session(&session_id)
            .with_details(json!({
                "provider": provider,
                "device_id": device_id,
                "replied": args.reply.is_some(),
                "next_action": report.next_action,
                "step_count": report.step_count,
            })),
    );
    Ok(report)
}

/// The session named by `--session-id`, else the latest active one
/// (narrowed by `--device-id` when given).
fn find_session(
    ctx: &mut AgentContext,
    args: &ContinueArgs,
) -> std::result::Result<Session, FailureReport> {
    match args.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(session_id) => ctx.sessions.get(session_id).map_err(reject),
        None => ctx
            .sessions
            .latest(args.device_id.as_deref())
            .map_err(reject)?
            .ok_or_else(|| FailureReport::new("session_not_found", NO_ACTIVE_SESSION)),
    }
}
