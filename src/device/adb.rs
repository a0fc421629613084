//! `adb`-backed device collector.

use super::state::{DetailLevel, DeviceState, Notification, RawOutput, Screenshot};
use super::DeviceCollector;
use crate::process::{SubprocessRegistry, run_tracked};
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static CURRENT_FOCUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mCurrentFocus=Window\{[^}]*?\s([A-Za-z0-9_.]+)(?:/[^\s}]*)?\}")
        .expect("Invalid current focus regex")
});
static FOCUSED_APP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mFocusedApp=.*?\s([A-Za-z0-9_.]+)/").expect("Invalid focused app regex")
});
static EXTRA_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"android\.title=\S+ \((.*)\)").expect("Invalid notification title regex")
});
static EXTRA_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"android\.text=\S+ \((.*)\)").expect("Invalid notification text regex")
});
static TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tickerText=(.*)").expect("Invalid ticker regex"));

/// Collects device state by shelling out to `adb`.
pub struct AdbCollector {
    adb_path: String,
    registry: Arc<SubprocessRegistry>,
}

impl AdbCollector {
    pub fn new(adb_path: impl Into<String>, registry: Arc<SubprocessRegistry>) -> Self {
        let adb_path = adb_path.into();
        let adb_path = if adb_path.trim().is_empty() {
            "adb".to_string()
        } else {
            adb_path.trim().to_string()
        };
        Self { adb_path, registry }
    }

    /// Fail with an install hint when the adb executable cannot be found.
    pub fn ensure_available(&self) -> Result<()> {
        if adb_exists(&self.adb_path) {
            return Ok(());
        }
        bail!(
            "ADB not found: `{}`. Install Android platform-tools and make sure adb is in PATH, \
             or set `device.adb_path` to a valid adb executable.",
            self.adb_path
        )
    }

    fn run_bytes(&self, args: &[&str], device_id: Option<&str>) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.adb_path);
        if let Some(id) = device_id {
            command.args(["-s", id]);
        }
        command.args(args);

        let output = run_tracked(&self.registry, command, None)
            .with_context(|| format!("adb {}", args.join(" ")))?;
        if !output.success() {
            bail!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                output.stderr_text()
            );
        }
        Ok(output.stdout)
    }

    fn run_text(&self, args: &[&str], device_id: Option<&str>) -> Result<String> {
        let bytes = self.run_bytes(args, device_id)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn screenshot(&self, device_id: &str) -> Result<Screenshot> {
        let png = self.run_bytes(&["exec-out", "screencap", "-p"], Some(device_id))?;
        if png.is_empty() {
            bail!("screencap returned no data");
        }
        Ok(Screenshot::png(STANDARD.encode(png)))
    }
}

impl DeviceCollector for AdbCollector {
    fn list_devices(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        let output = self
            .run_text(&["devices"], None)
            .context("ADB command failed. Ensure adb is installed and executable")?;
        Ok(parse_devices(&output))
    }

    fn get_state(&self, device_id: &str, detail: DetailLevel) -> Result<DeviceState> {
        let window = self.run_text(&["shell", "dumpsys", "window"], Some(device_id))?;
        let current_app = parse_current_app(&window);

        let notifications = match self.run_text(
            &["shell", "dumpsys", "notification", "--noredact"],
            Some(device_id),
        ) {
            Ok(dump) => parse_notifications(&dump),
            Err(e) => {
                debug!(error = %format!("{:#}", e), "notification dump failed");
                Vec::new()
            }
        };

        let screenshot = match detail {
            DetailLevel::Lite => None,
            DetailLevel::Snapshot => match self.screenshot(device_id) {
                Ok(shot) => Some(shot),
                Err(e) => {
                    debug!(error = %format!("{:#}", e), "screenshot capture failed");
                    None
                }
            },
        };

        Ok(DeviceState {
            current_app,
            notifications,
            screenshot,
            timestamp: Utc::now(),
        })
    }

    fn run_raw_command(&self, args: &[&str], device_id: &str) -> Result<RawOutput> {
        let mut command = Command::new(&self.adb_path);
        command.args(["-s", device_id]).args(args);
        let output = run_tracked(&self.registry, command, None)
            .with_context(|| format!("adb {}", args.join(" ")))?;
        if !output.success() {
            bail!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                output.stderr_text()
            );
        }
        Ok(RawOutput {
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
        })
    }
}

/// Whether `adb` resolves to an existing file, either as a path or on `PATH`.
fn adb_exists(adb: &str) -> bool {
    let path = Path::new(adb);
    if path.is_absolute() || path.components().count() > 1 {
        return path.exists();
    }
    let Some(search) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&search).any(|dir| {
        let candidate = dir.join(adb);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

/// Ids in the `device` state from `adb devices` output.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(id), Some("device")) => Some(id.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Foreground package from `dumpsys window` output.
pub fn parse_current_app(dump: &str) -> Option<String> {
    CURRENT_FOCUS
        .captures(dump)
        .or_else(|| FOCUSED_APP.captures(dump))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Notification titles and texts from `dumpsys notification --noredact`.
pub fn parse_notifications(dump: &str) -> Vec<Notification> {
    dump.split("NotificationRecord(")
        .skip(1)
        .filter_map(|record| {
            let capture = |re: &Regex| {
                re.captures(record)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty() && s != "null")
            };
            let notification = Notification {
                title: capture(&EXTRA_TITLE),
                text: capture(&EXTRA_TEXT),
                ticker: capture(&TICKER),
            };
            let empty = notification.title.is_none()
                && notification.text.is_none()
                && notification.ticker.is_none();
            (!empty).then_some(notification)
        })
        .collect()
}
