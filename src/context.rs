//! Per-invocation context for gui-agent commands.
//!
//! Resolves the collaborators every command needs (config, subprocess
//! registry, session store, device collector, adapter source, result
//! normalizer, audit log) once, so command handlers only deal with their own
//! flow. Tests build the same context around fakes.

use crate::adapter::{AdapterSource, Captioner, CommandAdapterSource, CommandCaptioner};
use crate::config::Config;
use crate::device::{self, AdbCollector, DeviceCollector};
use crate::error::{GuiAgentError, Result};
use crate::events::EventLog;
use crate::executor::{TimeoutExecutor, timeout_from_secs};
use crate::process::SubprocessRegistry;
use crate::result::ResultNormalizer;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs to run.
pub struct AgentContext {
    pub config: Config,
    pub registry: Arc<SubprocessRegistry>,
    pub sessions: SessionStore,
    pub collector: Arc<dyn DeviceCollector>,
    pub adapters: Box<dyn AdapterSource>,
    pub normalizer: ResultNormalizer,
    pub events: EventLog,
}

impl AgentContext {
    /// Wire the production collaborators: `adb`, command-bridge adapters and
    /// the optional caption command.
    pub fn from_config(config: Config, registry: Arc<SubprocessRegistry>) -> Result<Self> {
        let sessions = SessionStore::open(&config.session.storage_dir, config.session_ttl())?;
        let collector: Arc<dyn DeviceCollector> = Arc::new(AdbCollector::new(
            config.device.adb_path.clone(),
            Arc::clone(&registry),
        ));
        let captioner = match config.output.caption_command.as_deref() {
            Some(template) if !template.trim().is_empty() => Some(Arc::new(
                CommandCaptioner::new(template, Arc::clone(&registry))?,
            ) as Arc<dyn Captioner>),
            _ => None,
        };
        let adapters = Box::new(CommandAdapterSource::new(
            config.clone(),
            Arc::clone(&registry),
        ));

        Ok(Self::with_parts(
            config, registry, sessions, collector, adapters, captioner,
        ))
    }

    /// Assemble a context from already-built collaborators.
    pub fn with_parts(
        config: Config,
        registry: Arc<SubprocessRegistry>,
        sessions: SessionStore,
        collector: Arc<dyn DeviceCollector>,
        adapters: Box<dyn AdapterSource>,
        captioner: Option<Arc<dyn Captioner>>,
    ) -> Self {
        let normalizer = ResultNormalizer::new(config.output.clone(), captioner);
        let events = EventLog::from_config(&config.events);
        Self {
            config,
            registry,
            sessions,
            collector,
            adapters,
            normalizer,
            events,
        }
    }

    pub fn executor(&self) -> TimeoutExecutor {
        TimeoutExecutor::new(Arc::clone(&self.registry), self.config.cleanup_grace())
    }

    /// Deadline for an operation: the flag value, else the configured default.
    pub fn operation_timeout(&self, flag: Option<i64>) -> Result<Option<Duration>> {
        timeout_from_secs(flag.or(self.config.default_operation_timeout_sec))
    }

    /// Connected device ids as the collector reports them.
    pub fn connected_devices(&self) -> Result<Vec<String>> {
        self.collector
            .list_devices()
            .map_err(|e| GuiAgentError::adapter("Device discovery failed", e))
    }

    /// Pick the device for this invocation: explicit, then configured default,
    /// then the only connected device.
    pub fn select_device(&self, explicit: Option<&str>) -> Result<String> {
        let connected = self.connected_devices()?;
        device::select_device(explicit, self.config.default_device(), &connected)
    }

    pub fn ensure_device_connected(&self, device_id: &str) -> Result<()> {
        let connected = self.connected_devices()?;
        device::ensure_connected(device_id, &connected)
    }
}
