//! Outward-facing result records.
//!
//! Every command ends in exactly one JSON record with a `success` flag.
//! Task and tap results pass through [`ResultNormalizer`]; failures of any
//! kind are shaped by [`FailureReport`].

mod failure;
mod normalize;
pub mod output;


pub use failure::FailureReport;
pub use normalize::{Observation, ResultNormalizer, TAP_PROVIDER, TapReport, TaskCall, TaskReport};
pub use output::OutputFormat;

use crate::adapter::RawResult;
use crate::device::DeviceState;
use serde::Serialize;
use std::fmt;

/// Action type an adapter reports when it needs input from the user.
pub const NEEDS_REPLY_ACTION: &str = "INFO_ACTION_NEEDS_REPLY";

const COMPLETE_STATUSES: [&str; 3] = ["completed", "done", "success"];

const STATELESS_HINT: &str =
    " Stateless mode is active; run execute --stateless for the next independent call.";

pub const TAP_MESSAGE: &str = "Tap executed. Review screenshot and run another tap if needed.";

/// What the caller should do after this result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Complete,
    NeedsReply,
    Continue,
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Complete => write!(f, "complete"),
            NextAction::NeedsReply => write!(f, "needs_reply"),
            NextAction::Continue => write!(f, "continue"),
        }
    }
}

impl NextAction {
    /// Human summary for a task result.
    pub fn message(self, caption: &str, continuation_supported: bool) -> String {
        let mut message = match self {
            NextAction::Complete => format!("Task completed. {}", caption),
            NextAction::NeedsReply => format!("User reply required. Current state: {}", caption),
            NextAction::Continue => format!("Task in progress. Current state: {}", caption),
        };
        if !continuation_supported && self != NextAction::Complete {
            message.push_str(STATELESS_HINT);
        }
        message
    }
}

/// How a result relates to the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Stateful,
    Stateless,
    DirectCoordinate,
    DirectCoordinateOnly,
}

impl SessionMode {
    pub fn is_persisted(self) -> bool {
        self == SessionMode::Stateful
    }
}

/// First non-empty string value among `keys`.
fn str_field<'a>(raw: &'a RawResult, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
}

/// Derive the next action from an adapter result.
pub fn next_action(raw: &RawResult) -> NextAction {
    if str_field(raw, &["action_type", "type"]) == Some(NEEDS_REPLY_ACTION) {
        return NextAction::NeedsReply;
    }
    match str_field(raw, &["status", "state"]) {
        Some(status) if COMPLETE_STATUSES.contains(&status) => NextAction::Complete,
        _ => NextAction::Continue,
    }
}

/// Deterministic caption from the foreground app and the first notification.
pub fn fallback_caption(state: &DeviceState) -> String {
    let app = state
        .current_app
        .as_deref()
        .filter(|a| !a.is_empty())
        .unwrap_or("unknown");
    let mut caption = format!("current_app={}", app);

    if let Some(first) = state.notifications.first() {
        let title = first.title.as_deref().unwrap_or_default();
        let text = first
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(first.ticker.as_deref())
            .unwrap_or_default();
        let summary: Vec<&str> = [title, text].into_iter().filter(|s| !s.is_empty()).collect();
        if !summary.is_empty() {
            caption.push_str("; notification=");
            caption.push_str(&summary.join(" - "));
        }
    }
    caption
}
