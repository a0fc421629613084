//! Session record definition.

use crate::adapter::RawResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle status of a session.
///
/// Transitions: `active -> completed`, `active -> expired`. Terminal statuses
/// never return to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Expired => write!(f, "expired"),
        }
    }
}

/// One recorded continuation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub result: RawResult,
}

/// A continuable multi-step task, persisted as `<storage_dir>/<session_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
    pub provider: String,
    pub task: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub step_count: u64,
    /// Most recent adapter payload; may carry an adapter-owned `session_id`.
    #[serde(default)]
    pub last_result: RawResult,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Session {
    /// Whether more than `ttl` has passed since the last update.
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.updated_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age > ttl,
            // A TTL beyond chrono's range never expires.
            Err(_) => false,
        }
    }

    /// Continuation token to hand back to the adapter: the adapter's own
    /// `session_id` from the last result when present, else ours.
    pub fn continuation_token(&self) -> String {
        self.last_result
            .get("session_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.session_id.clone())
    }
}

/// Short random session id: the first 8 hex characters of a v4 UUID.
pub fn new_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
