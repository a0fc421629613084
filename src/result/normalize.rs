//! Folding post-action device state into task and tap results.

use super::{NextAction, SessionMode, TAP_MESSAGE, fallback_caption, next_action};
use crate::adapter::{Captioner, RawResult};
use crate::config::OutputConfig;
use crate::device::{CoordinateResolution, DeviceState};
use crate::error::Result;
use crate::fs::atomic_write;
use crate::session::{SessionStatus, SessionStore};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Task identity for a task result.
#[derive(Debug, Clone)]
pub struct TaskCall {
    pub session_id: String,
    /// The task as the user phrased it, without prompt shaping.
    pub task: String,
    pub provider: String,
    pub device_id: String,
    pub mode: SessionMode,
}

/// Post-action state plus the artifacts derived from it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub state: DeviceState,
    pub caption: String,
    pub screenshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub success: bool,
    pub session_id: String,
    pub task: String,
    pub provider: String,
    pub device_id: String,
    pub step_count: u64,
    pub caption: String,
    pub screenshot_path: Option<PathBuf>,
    pub next_action: NextAction,
    pub current_app: Option<String>,
    pub message: String,
    pub session_mode: SessionMode,
    pub session_persisted: bool,
    pub continuation_supported: bool,
    pub timed_out: bool,
    pub raw_result: RawResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct TapReport {
    pub success: bool,
    pub session_id: String,
    pub task: &'static str,
    pub provider: &'static str,
    pub device_id: String,
    pub step_count: u64,
    pub caption: String,
    pub screenshot_path: Option<PathBuf>,
    pub next_action: NextAction,
    pub current_app: Option<String>,
    pub message: &'static str,
    pub session_mode: SessionMode,
    pub session_persisted: bool,
    pub continuation_supported: bool,
    pub timed_out: bool,
    pub coordinate: CoordinateResolution,
    pub raw_result: serde_json::Value,
}

pub const TAP_TASK: &str = "direct_coordinate_tap";
pub const TAP_PROVIDER: &str = "direct_adb";

/// Turns adapter output and device state into result records.
#[derive(Clone)]
pub struct ResultNormalizer {
    output: OutputConfig,
    captioner: Option<Arc<dyn Captioner>>,
}

impl ResultNormalizer {
    pub fn new(output: OutputConfig, captioner: Option<Arc<dyn Captioner>>) -> Self {
        Self { output, captioner }
    }

    /// Save the screenshot (when enabled) and caption the state.
    ///
    /// With `caption_task` set, a configured captioner is tried first; any
    /// failure falls back to [`fallback_caption`].
    pub fn observe(
        &self,
        session_id: &str,
        caption_task: Option<&str>,
        state: DeviceState,
    ) -> Observation {
        let screenshot_path = self.save_screenshot(session_id, &state);

        let model_caption = match (caption_task, state.screenshot_b64(), &self.captioner) {
            (Some(task), Some(b64), Some(captioner)) if self.output.enable_caption => {
                match captioner.caption(task, b64) {
                    Ok(caption) if !caption.trim().is_empty() => Some(caption),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %format!("{:#}", e), "captioning failed, using fallback caption");
                        None
                    }
                }
            }
            _ => None,
        };
        let caption = model_caption.unwrap_or_else(|| fallback_caption(&state));

        Observation {
            state,
            caption,
            screenshot_path,
        }
    }

    fn save_screenshot(&self, session_id: &str, state: &DeviceState) -> Option<PathBuf> {
        if !self.output.save_screenshot {
            return None;
        }
        let b64 = state.screenshot_b64()?;
        let bytes = match STANDARD.decode(b64) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "screenshot is not valid base64, not saving");
                return None;
            }
        };
        let path = self.output.dir.join(session_id).join("screenshot.png");
        match atomic_write(&path, &bytes) {
            Ok(()) => {
                debug!(path = %path.display(), "saved screenshot");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "failed to save screenshot");
                None
            }
        }
    }

    /// Build the task result, advancing the session when the call is stateful.
    pub fn task_report(
        &self,
        call: TaskCall,
        raw: RawResult,
        observation: Observation,
        sessions: &mut SessionStore,
    ) -> Result<TaskReport> {
        let next = next_action(&raw);
        let persisted = call.mode.is_persisted();

        let step_count = if persisted {
            let status = (next == NextAction::Complete).then_some(SessionStatus::Completed);
            sessions
                .update(&call.session_id, raw.clone(), status)?
                .step_count
        } else {
            1
        };

        Ok(TaskReport {
            success: true,
            message: next.message(&observation.caption, persisted),
            session_id: call.session_id,
            task: call.task,
            provider: call.provider,
            device_id: call.device_id,
            step_count,
            caption: observation.caption,
            screenshot_path: observation.screenshot_path,
            next_action: next,
            current_app: observation.state.current_app,
            session_mode: call.mode,
            session_persisted: persisted,
            continuation_supported: persisted,
            timed_out: false,
            raw_result: raw,
        })
    }

    /// Build the result of a direct coordinate tap.
    pub fn tap_report(
        &self,
        session_id: String,
        device_id: String,
        coordinate: CoordinateResolution,
        observation: Observation,
    ) -> TapReport {
        TapReport {
            success: true,
            session_id,
            task: TAP_TASK,
            provider: TAP_PROVIDER,
            device_id,
            step_count: 1,
            caption: observation.caption,
            screenshot_path: observation.screenshot_path,
            next_action: NextAction::Continue,
            current_app: observation.state.current_app,
            message: TAP_MESSAGE,
            session_mode: SessionMode::DirectCoordinate,
            session_persisted: false,
            continuation_supported: false,
            timed_out: false,
            raw_result: json!({
                "action": "tap",
                "tap": coordinate.tap,
                "effective_coord_space": coordinate.effective_coord_space,
                "clamped": coordinate.clamped,
            }),
            coordinate,
        }
    }
}
