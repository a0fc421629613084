//! Shared fakes and fixtures for unit tests.

use crate::adapter::{Adapter, AdapterSource, Captioner, ContinueRequest, RawResult, StartRequest};
use crate::config::Config;
use crate::context::AgentContext;
use crate::device::screen::png_header_b64;
use crate::device::{DetailLevel, DeviceCollector, DeviceState, Notification, RawOutput, Screenshot};
use crate::error::{GuiAgentError, Result};
use crate::process::SubprocessRegistry;
use crate::session::SessionStore;
use anyhow::anyhow;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) const DEVICE: &str = "emulator-5554";

/// Config whose every on-disk location lives under `dir`.
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.session.storage_dir = dir.join("sessions");
    config.output.dir = dir.join("outputs");
    config.events.path = Some(dir.join("events.ndjson"));
    config
}

/// Device state showing `app` with a 1080x2400 screenshot.
pub(crate) fn snapshot_state(app: &str) -> DeviceState {
    let mut state = DeviceState::empty();
    state.current_app = Some(app.to_string());
    state.notifications = vec![Notification {
        title: Some("Messages".into()),
        text: Some("New message".into()),
        ticker: None,
    }];
    state.screenshot = Some(Screenshot::png(png_header_b64(1080, 2400)));
    state
}

/// Scriptable [`DeviceCollector`].
pub(crate) struct FakeCollector {
    pub devices: Mutex<Vec<String>>,
    pub list_error: Mutex<Option<String>>,
    pub state: Mutex<DeviceState>,
    pub state_error: Mutex<Option<String>>,
    /// Stdout for `shell wm size`.
    pub wm_size: Mutex<String>,
    /// Every raw command issued, in order.
    pub commands: Mutex<Vec<Vec<String>>>,
    /// Every `get_state` call, in order.
    pub state_requests: Mutex<Vec<DetailLevel>>,
}

impl FakeCollector {
    pub(crate) fn with_devices(devices: &[&str]) -> Self {
        Self {
            devices: Mutex::new(devices.iter().map(|d| d.to_string()).collect()),
            list_error: Mutex::new(None),
            state: Mutex::new(snapshot_state("com.android.settings")),
            state_error: Mutex::new(None),
            wm_size: Mutex::new("Physical size: 1080x2400\n".to_string()),
            commands: Mutex::new(Vec::new()),
            state_requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_state(&self, state: DeviceState) {
        *self.state.lock().unwrap() = state;
    }

    pub(crate) fn fail_state(&self, message: &str) {
        *self.state_error.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn taps(&self) -> Vec<Vec<String>> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&["shell".to_string(), "input".to_string()]))
            .cloned()
            .collect()
    }
}

impl DeviceCollector for FakeCollector {
    fn list_devices(&self) -> anyhow::Result<Vec<String>> {
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    fn get_state(&self, _device_id: &str, detail: DetailLevel) -> anyhow::Result<DeviceState> {
        self.state_requests.lock().unwrap().push(detail);
        if let Some(message) = self.state_error.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        let mut state = self.state.lock().unwrap().clone();
        if detail == DetailLevel::Lite {
            state.screenshot = None;
        }
        Ok(state)
    }

    fn run_raw_command(&self, args: &[&str], _device_id: &str) -> anyhow::Result<RawOutput> {
        self.commands
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());
        let stdout = if args == ["shell", "wm", "size"] {
            self.wm_size.lock().unwrap().clone()
        } else {
            String::new()
        };
        Ok(RawOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

/// Adapter that replays queued results and records every request.
pub(crate) struct FakeAdapter {
    name: String,
    results: Mutex<VecDeque<std::result::Result<RawResult, String>>>,
    delay: Mutex<Option<Duration>>,
    pub starts: Mutex<Vec<StartRequest>>,
    pub continues: Mutex<Vec<ContinueRequest>>,
}

impl FakeAdapter {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            starts: Mutex::new(Vec::new()),
            continues: Mutex::new(Vec::new()),
        }
    }

    /// Queue a result; `value` must be a JSON object.
    pub(crate) fn push_result(&self, value: Value) {
        let Value::Object(map) = value else {
            panic!("adapter results must be JSON objects");
        };
        self.results.lock().unwrap().push_back(Ok(map));
    }

    pub(crate) fn push_error(&self, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Make every call block for `delay` before answering.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn next_result(&self) -> anyhow::Result<RawResult> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(anyhow!(message)),
            None => {
                let mut running = RawResult::new();
                running.insert("status".into(), Value::from("running"));
                Ok(running)
            }
        }
    }
}

impl Adapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_task(&self, request: &StartRequest) -> anyhow::Result<RawResult> {
        self.starts.lock().unwrap().push(request.clone());
        self.next_result()
    }

    fn continue_task(&self, request: &ContinueRequest) -> anyhow::Result<RawResult> {
        self.continues.lock().unwrap().push(request.clone());
        self.next_result()
    }
}

/// Hands out the same [`FakeAdapter`] for every provider.
pub(crate) struct FakeAdapterSource(pub Arc<FakeAdapter>);

impl AdapterSource for FakeAdapterSource {
    fn adapter(&self, _provider: &str) -> Result<Arc<dyn Adapter>> {
        Ok(Arc::clone(&self.0) as Arc<dyn Adapter>)
    }
}

/// Adapter source with nothing configured.
pub(crate) struct NoAdapters;

impl AdapterSource for NoAdapters {
    fn adapter(&self, provider: &str) -> Result<Arc<dyn Adapter>> {
        Err(GuiAgentError::ProviderUnavailable(format!(
            "No adapter command configured for provider '{}'",
            provider
        )))
    }
}

/// Captioner with a fixed answer, or a fixed failure when `None`.
pub(crate) struct FakeCaptioner(pub Option<String>);

impl Captioner for FakeCaptioner {
    fn caption(&self, _task: &str, _screenshot_b64: &str) -> anyhow::Result<String> {
        self.0.clone().ok_or_else(|| anyhow!("caption model offline"))
    }
}

/// A full [`AgentContext`] around fakes, rooted in a temp directory.
pub(crate) struct TestEnv {
    pub dir: TempDir,
    pub collector: Arc<FakeCollector>,
    pub adapter: Arc<FakeAdapter>,
    pub ctx: AgentContext,
}

impl TestEnv {
    /// One connected device and default config.
    pub(crate) fn new() -> Self {
        Self::build(|_| {}, FakeCollector::with_devices(&[DEVICE]))
    }

    pub(crate) fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, FakeCollector::with_devices(&[DEVICE]))
    }

    pub(crate) fn build(configure: impl FnOnce(&mut Config), collector: FakeCollector) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        configure(&mut config);

        let registry = Arc::new(SubprocessRegistry::new());
        let sessions =
            SessionStore::open(&config.session.storage_dir, config.session_ttl()).unwrap();
        let collector = Arc::new(collector);
        let adapter = Arc::new(FakeAdapter::new(&config.default_provider));
        let ctx = AgentContext::with_parts(
            config,
            registry,
            sessions,
            Arc::clone(&collector) as Arc<dyn DeviceCollector>,
            Box::new(FakeAdapterSource(Arc::clone(&adapter))),
            None,
        );

        Self {
            dir,
            collector,
            adapter,
            ctx,
        }
    }

    /// Parsed audit events written so far.
    pub(crate) fn events(&self) -> Vec<Value> {
        let path = self.dir.path().join("events.ndjson");
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}
