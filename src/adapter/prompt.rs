//! Shaping of task text and extra info before it reaches an adapter.

use serde_json::{Map, Value};

/// Phrase whose presence means the guard is already attached.
pub const GUARD_MARKER: &str = "output COMPLETE immediately and stop";

const COMPLETE_GUARD: &str = "Strict rule: after completing the goal, output COMPLETE immediately and stop.\n\
After completing the goal, output COMPLETE immediately and stop; do not continue exploring.";

const STATELESS_PREAMBLE: &str = "Execution mode: stateless minimal task.\n\
Requirement: continue from the current screen; do not press Home; do not reset app/environment.\n\
Only perform the minimum actions needed for this request.";

/// Upper bound on steps for a stateless call.
pub const STATELESS_MAX_STEPS: u32 = 4;

/// Append the COMPLETE-and-stop guard to `task`, once.
pub fn with_complete_guard(task: &str) -> String {
    let normalized = task.trim();
    if normalized.is_empty() {
        return COMPLETE_GUARD.to_string();
    }
    if normalized.contains(GUARD_MARKER) {
        return normalized.to_string();
    }
    format!("{}\n\n{}", normalized, COMPLETE_GUARD)
}

/// Guarded task prefixed with the stateless preamble.
pub fn stateless_task(task: &str) -> String {
    format!(
        "{}\nUser task: {}",
        STATELESS_PREAMBLE,
        with_complete_guard(task)
    )
}

/// Fill in the stateless execution hints without overriding caller values.
pub fn stateless_extra_info(extra: Option<Map<String, Value>>) -> Map<String, Value> {
    let mut extra = extra.unwrap_or_default();
    let defaults = [
        ("execution_mode", Value::from("stateless")),
        ("new_conversation", Value::Bool(true)),
        ("preserve_current_app_state", Value::Bool(true)),
        ("minimal_actions", Value::Bool(true)),
        ("reset_environment", Value::Bool(false)),
        ("reflush_app", Value::Bool(false)),
    ];
    for (key, value) in defaults {
        extra.entry(key).or_insert(value);
    }
    extra
}

/// Step budget for a stateless call when the caller gave none.
pub fn stateless_max_steps(default_max_steps: u32) -> u32 {
    default_max_steps.min(STATELESS_MAX_STEPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guard_is_appended_after_trimmed_task() {
        let guarded = with_complete_guard("  open settings \n");
        assert!(guarded.starts_with("open settings\n\nStrict rule:"));
        assert!(guarded.ends_with("do not continue exploring."));
    }

    #[test]
    fn guard_alone_for_blank_task() {
        assert_eq!(with_complete_guard("   "), COMPLETE_GUARD);
    }

    #[test]
    fn guard_is_added_once() {
        let once = with_complete_guard("open settings");
        assert_eq!(with_complete_guard(&once), once);
    }

    #[test]
    fn stateless_task_wraps_guarded_task() {
        let task = stateless_task("turn on wifi");
        assert!(task.starts_with("Execution mode: stateless minimal task.\n"));
        assert!(task.contains("do not press Home"));
        assert!(task.contains("\nUser task: turn on wifi\n\nStrict rule:"));
    }

    #[test]
    fn stateless_extra_info_keeps_caller_values() {
        let caller = json!({"reset_environment": true, "locale": "en"});
        let extra = stateless_extra_info(caller.as_object().cloned());

        assert_eq!(extra["execution_mode"], "stateless");
        assert_eq!(extra["new_conversation"], true);
        assert_eq!(extra["preserve_current_app_state"], true);
        assert_eq!(extra["minimal_actions"], true);
        assert_eq!(extra["reset_environment"], true);
        assert_eq!(extra["reflush_app"], false);
        assert_eq!(extra["locale"], "en");
    }

    #[test]
    fn stateless_steps_are_capped() {
        assert_eq!(stateless_max_steps(20), 4);
        assert_eq!(stateless_max_steps(2), 2);
    }
}
