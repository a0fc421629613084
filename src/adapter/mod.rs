//! Adapter interface and the command-bridge implementation.
//!
//! An adapter drives a device toward a task on behalf of a model provider.
//! The core only reads a few keys of what an adapter returns (`action_type`
//! or `type`, `status` or `state`, and `session_id`), so results stay opaque
//! JSON objects.

pub mod captioner;
pub mod command;
pub mod prompt;
pub mod template;

pub use captioner::{Captioner, CommandCaptioner};
pub use command::{CommandAdapter, CommandAdapterSource};

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Opaque adapter response.
pub type RawResult = Map<String, Value>;

/// Start a new task on a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    pub device_id: String,
    pub task: String,
    pub max_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<Map<String, Value>>,
}

/// Resume a task the adapter has already started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinueRequest {
    pub device_id: String,
    /// Adapter-owned continuation token.
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub task: String,
    pub max_steps: u32,
}

pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn start_task(&self, request: &StartRequest) -> anyhow::Result<RawResult>;

    fn continue_task(&self, request: &ContinueRequest) -> anyhow::Result<RawResult>;
}

/// Builds the adapter for a provider name.
pub trait AdapterSource: Send + Sync {
    fn adapter(&self, provider: &str) -> crate::error::Result<Arc<dyn Adapter>>;
}
