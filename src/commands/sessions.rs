//! Implementation of the `gui-agent sessions` command.
//!
//! Lists active sessions by default; `--purge-expired` and `--delete` do
//! housekeeping on the store instead.

use super::failure;
use crate::cli::SessionsArgs;
use crate::context::AgentContext;
use crate::error::GuiAgentError;
use crate::events::{Event, EventAction};
use serde_json::{Value, json};
use tracing::info;

pub fn cmd_sessions(ctx: &mut AgentContext, args: SessionsArgs) -> Value {
    if args.purge_expired {
        return purge(ctx);
    }
    if let Some(session_id) = args.delete {
        return delete(ctx, &session_id);
    }
    list(ctx)
}

fn list(ctx: &mut AgentContext) -> Value {
    let sessions = match ctx.sessions.list_active() {
        Ok(sessions) => sessions,
        Err(e) => return failure(&e, None),
    };
    let rows: Vec<Value> = sessions
        .iter()
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "device_id": s.device_id,
                "provider": s.provider,
                "task": s.task,
                "status": s.status,
                "step_count": s.step_count,
                "created_at": s.created_at,
                "updated_at": s.updated_at,
            })
        })
        .collect();

    json!({
        "success": true,
        "count": rows.len(),
        "sessions": rows,
    })
}

fn purge(ctx: &mut AgentContext) -> Value {
    match ctx.sessions.purge_expired() {
        Ok(purged) => {
            info!(purged, "purged expired sessions");
            ctx.events
                .record(Event::new(EventAction::Purge).with_details(json!({ "purged": purged })));
            json!({ "success": true, "purged": purged })
        }
        Err(e) => failure(&e, Some("Session purge failed")),
    }
}

fn delete(ctx: &mut AgentContext, session_id: &str) -> Value {
    match ctx.sessions.delete(session_id) {
        Ok(true) => json!({ "success": true, "deleted": session_id }),
        Ok(false) => failure(&GuiAgentError::SessionNotFound(session_id.to_string()), None),
        Err(e) => failure(&e, Some("Session delete failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DEVICE, TestEnv};

    fn args(purge_expired: bool, delete: Option<&str>) -> SessionsArgs {
        SessionsArgs {
            purge_expired,
            delete: delete.map(str::to_string),
        }
    }

    #[test]
    fn lists_active_sessions_only() {
        let mut env = TestEnv::new();
        let open = env.ctx.sessions.create(DEVICE, "local", "open settings").unwrap();
        let done = env.ctx.sessions.create(DEVICE, "local", "open camera").unwrap();
        env.ctx.sessions.complete(&done.session_id).unwrap();

        let record = cmd_sessions(&mut env.ctx, args(false, None));
        assert_eq!(record["success"], true);
        assert_eq!(record["count"], 1);
        let row = &record["sessions"][0];
        assert_eq!(row["session_id"], open.session_id.as_str());
        assert_eq!(row["status"], "active");
        assert_eq!(row["step_count"], 0);
        assert!(row.get("history").is_none());
    }

    #[test]
    fn delete_removes_one_session() {
        let mut env = TestEnv::new();
        let session = env.ctx.sessions.create(DEVICE, "local", "open settings").unwrap();

        let record = cmd_sessions(&mut env.ctx, args(false, Some(&session.session_id)));
        assert_eq!(record["success"], true);
        assert_eq!(record["deleted"], session.session_id.as_str());

        let again = cmd_sessions(&mut env.ctx, args(false, Some(&session.session_id)));
        assert_eq!(again["success"], false);
        assert_eq!(again["error"], "session_not_found");
    }

    #[test]
    fn purge_reports_count_and_logs_event() {
        let mut env = TestEnv::with_config(|c| c.session.expire_seconds = 0);
        env.ctx.sessions.create(DEVICE, "local", "open settings").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let record = cmd_sessions(&mut env.ctx, args(true, None));
        assert_eq!(record["success"], true);
        assert_eq!(record["purged"], 1);

        let events = env.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"], "purge");
        assert_eq!(events[0]["details"]["purged"], 1);
    }
}
