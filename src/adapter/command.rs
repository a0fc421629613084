//! Adapter that delegates to an external bridge command.
//!
//! The bridge receives one JSON request on stdin:
//!
//! ```json
//! {"op": "start", "device_id": "...", "task": "...", "max_steps": 20,
//!  "extra_info": {...}, "adapter": {"name": "zhipu", "adapter": "open_autoglm", ...}}
//! ```
//!
//! and prints its result as a JSON object on stdout. Log lines before the
//! result are ignored; the last JSON object printed wins.

use super::template::{TemplateVars, render_argv};
use super::{Adapter, AdapterSource, ContinueRequest, RawResult, StartRequest};
use crate::config::Config;
use crate::error::{GuiAgentError, Result};
use crate::process::{SubprocessRegistry, run_tracked};
use crate::providers::{ResolvedProvider, resolve_provider};
use anyhow::{Context, bail};
use serde_json::Value;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable every bridge receives the API key in.
pub const BRIDGE_API_KEY_ENV: &str = "GUI_AGENT_API_KEY";

pub struct CommandAdapter {
    provider: ResolvedProvider,
    argv: Vec<String>,
    registry: Arc<SubprocessRegistry>,
}

impl CommandAdapter {
    /// Render `template` for `provider`.
    pub fn new(
        provider: ResolvedProvider,
        template: &str,
        registry: Arc<SubprocessRegistry>,
    ) -> Result<Self> {
        let argv = render_argv(template, &template_vars(&provider)).map_err(|e| {
            GuiAgentError::Config(format!(
                "invalid adapter command for provider '{}': {}",
                provider.name, e
            ))
        })?;
        Ok(Self {
            provider,
            argv,
            registry,
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn invoke(&self, op: &str, mut request: Value) -> anyhow::Result<RawResult> {
        if let Some(fields) = request.as_object_mut() {
            fields.insert("op".to_string(), Value::from(op));
            fields.insert("adapter".to_string(), serde_json::to_value(&self.provider)?);
        }
        let input = serde_json::to_vec(&request)?;

        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]);
        if let Some(key) = &self.provider.api_key {
            command.env(BRIDGE_API_KEY_ENV, key);
            if let Some(var) = &self.provider.api_key_env {
                command.env(var, key);
            }
        }

        info!(provider = %self.provider.name, op, program = %self.argv[0], "invoking adapter bridge");
        let output = run_tracked(&self.registry, command, Some(input))
            .with_context(|| format!("adapter bridge for provider '{}'", self.provider.name))?;

        if !output.success() {
            bail!(
                "adapter bridge '{}' exited with {}: {}",
                self.argv[0],
                output.status,
                output.stderr_text()
            );
        }

        let stdout = output.stdout_text();
        debug!(bytes = stdout.len(), "adapter bridge finished");
        parse_result(&stdout).with_context(|| {
            format!(
                "adapter bridge '{}' printed no JSON object on stdout",
                self.argv[0]
            )
        })
    }
}

impl Adapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn start_task(&self, request: &StartRequest) -> anyhow::Result<RawResult> {
        self.invoke("start", serde_json::to_value(request)?)
    }

    fn continue_task(&self, request: &ContinueRequest) -> anyhow::Result<RawResult> {
        self.invoke("continue", serde_json::to_value(request)?)
    }
}

fn template_vars(provider: &ResolvedProvider) -> TemplateVars {
    TemplateVars::from([
        ("provider", provider.name.clone()),
        ("adapter", provider.adapter.clone()),
        ("model_name", provider.model_name.clone()),
        (
            "model_provider",
            provider.model_provider.clone().unwrap_or_default(),
        ),
        ("base_url", provider.base_url.clone().unwrap_or_default()),
    ])
}

/// Last JSON object in `stdout`: a whole-output object, else the last line that is one.
fn parse_result(stdout: &str) -> anyhow::Result<RawResult> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(stdout.trim()) {
        return Ok(map);
    }
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .context("no JSON object found")
}

/// Builds [`CommandAdapter`]s from config.
///
/// A provider's own `command` wins over the global `adapter_command`.
pub struct CommandAdapterSource {
    config: Config,
    registry: Arc<SubprocessRegistry>,
}

impl CommandAdapterSource {
    pub fn new(config: Config, registry: Arc<SubprocessRegistry>) -> Self {
        Self { config, registry }
    }
}

impl AdapterSource for CommandAdapterSource {
    fn adapter(&self, provider: &str) -> Result<Arc<dyn Adapter>> {
        let resolved = resolve_provider(provider, &self.config)?;
        let template = self
            .config
            .provider(provider)
            .and_then(|p| p.command.as_deref())
            .or(self.config.adapter_command.as_deref())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GuiAgentError::ProviderUnavailable(format!(
                    "No adapter command configured for provider '{}': set providers.{}.command \
                     or adapter_command in config",
                    provider, provider
                ))
            })?;
        let adapter = CommandAdapter::new(resolved, template, Arc::clone(&self.registry))?;
        debug!(provider, argv = ?adapter.argv(), "resolved adapter bridge");
        Ok(Arc::new(adapter))
    }
}
