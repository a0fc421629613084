//! File-backed session store with lazy expiry.

use super::model::{HistoryEntry, Session, SessionStatus, new_session_id};
use crate::adapter::RawResult;
use crate::error::{GuiAgentError, Result};
use crate::fs::atomic_write_file;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Owns every session record. Callers only ever see clones.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    /// Open (creating if needed) the store at `dir` and load every record.
    ///
    /// Unreadable or malformed records are skipped with a warning. Expiry is
    /// left to the first read of each record.
    pub fn open<P: AsRef<Path>>(dir: P, ttl: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            GuiAgentError::Io(format!(
                "failed to create session directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let entries = fs::read_dir(&dir).map_err(|e| {
            GuiAgentError::Io(format!(
                "failed to read session directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut sessions = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_record(&path) {
                Ok(session) => {
                    sessions.insert(session.session_id.clone(), session);
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping unreadable session record");
                }
            }
        }
        debug!(dir = %dir.display(), count = sessions.len(), "loaded sessions");

        Ok(Self { dir, ttl, sessions })
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string_pretty(session).map_err(|e| {
            GuiAgentError::Io(format!(
                "failed to serialize session '{}': {}",
                session.session_id, e
            ))
        })?;
        atomic_write_file(self.record_path(&session.session_id), &json)
    }

    /// Flip `session_id` to expired when it is active and past its TTL.
    /// Returns whether it changed.
    fn expire_if_stale(&mut self, session_id: &str) -> Result<bool> {
        let now = Utc::now();
        let ttl = self.ttl;
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        if session.status != SessionStatus::Active || !session.is_stale(ttl, now) {
            return Ok(false);
        }
        session.status = SessionStatus::Expired;
        let snapshot = session.clone();
        debug!(session_id, "session expired");
        self.save(&snapshot)?;
        Ok(true)
    }

    /// Start a new active session and persist it.
    pub fn create(&mut self, device_id: &str, provider: &str, task: &str) -> Result<Session> {
        let mut session_id = new_session_id();
        while self.sessions.contains_key(&session_id) {
            session_id = new_session_id();
        }
        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            device_id: device_id.to_string(),
            provider: provider.to_string(),
            task: task.to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
            step_count: 0,
            last_result: RawResult::new(),
            history: Vec::new(),
        };
        self.save(&session)?;
        self.sessions.insert(session_id, session.clone());
        Ok(session)
    }

    /// Fetch a session, expiring it first if its TTL has passed.
    pub fn get(&mut self, session_id: &str) -> Result<Session> {
        if !self.sessions.contains_key(session_id) {
            return Err(GuiAgentError::SessionNotFound(session_id.to_string()));
        }
        self.expire_if_stale(session_id)?;
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GuiAgentError::SessionNotFound(session_id.to_string()))
    }

    /// Record one continuation step.
    ///
    /// Increments `step_count`, refreshes `updated_at`, appends to history
    /// and replaces `last_result`. `status` may move the session to a
    /// terminal state. Terminal sessions are rejected with `SessionNotActive`.
    pub fn update(
        &mut self,
        session_id: &str,
        result: RawResult,
        status: Option<SessionStatus>,
    ) -> Result<Session> {
        let current = self.get(session_id)?;
        if current.status.is_terminal() {
            return Err(GuiAgentError::SessionNotActive {
                session_id: session_id.to_string(),
                status: current.status,
            });
        }

        let snapshot = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                return Err(GuiAgentError::SessionNotFound(session_id.to_string()));
            };
            session.updated_at = Utc::now();
            session.step_count += 1;
            session.history.push(HistoryEntry {
                step: session.step_count,
                timestamp: session.updated_at,
                result: result.clone(),
            });
            session.last_result = result;
            if let Some(status) = status {
                session.status = status;
            }
            session.clone()
        };
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Mark an active session completed without recording a step.
    pub fn complete(&mut self, session_id: &str) -> Result<Session> {
        let current = self.get(session_id)?;
        if current.status.is_terminal() {
            return Err(GuiAgentError::SessionNotActive {
                session_id: session_id.to_string(),
                status: current.status,
            });
        }
        let snapshot = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                return Err(GuiAgentError::SessionNotFound(session_id.to_string()));
            };
            session.status = SessionStatus::Completed;
            session.updated_at = Utc::now();
            session.clone()
        };
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Active sessions, oldest update first, after expiring stale ones.
    pub fn list_active(&mut self) -> Result<Vec<Session>> {
        let ids: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| s.session_id.clone())
            .collect();
        for id in &ids {
            self.expire_if_stale(id)?;
        }

        let mut active: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(active)
    }

    /// Most recently updated active session, optionally for one device.
    pub fn latest(&mut self, device_id: Option<&str>) -> Result<Option<Session>> {
        let active = self.list_active()?;
        Ok(active
            .into_iter()
            .filter(|s| device_id.is_none_or(|d| s.device_id == d))
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at)))
    }

    /// Remove every session older than the TTL, regardless of status.
    pub fn purge_expired(&mut self) -> Result<usize> {
        let now = Utc::now();
        let ttl = self.ttl;
        let stale: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_stale(ttl, now))
            .map(|s| s.session_id.clone())
            .collect();

        for id in &stale {
            self.remove_record(id)?;
            self.sessions.remove(id);
        }
        debug!(count = stale.len(), "purged expired sessions");
        Ok(stale.len())
    }

    /// Delete one session. Returns whether it existed.
    pub fn delete(&mut self, session_id: &str) -> Result<bool> {
        if !self.sessions.contains_key(session_id) {
            return Ok(false);
        }
        self.remove_record(session_id)?;
        self.sessions.remove(session_id);
        Ok(true)
    }

    fn remove_record(&self, session_id: &str) -> Result<()> {
        let path = self.record_path(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GuiAgentError::Io(format!(
                "failed to remove session record '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

fn load_record(path: &Path) -> std::result::Result<Session, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}
