//! CLI argument parsing for gui-agent.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::result::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

/// gui-agent: timeout-bounded GUI automation for phones and emulators.
///
/// Runs natural-language tasks through a model-provider adapter, continues
/// multi-step sessions, and issues direct coordinate taps over ADB. Every
/// command prints exactly one JSON record (or a text summary with --text).
#[derive(Parser, Debug)]
#[command(name = "gui-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (default: ~/.gui_agent_skill/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output the result as JSON (default).
    #[arg(long, global = true)]
    pub json: bool,

    /// Output a human-readable summary instead of JSON.
    #[arg(long, global = true)]
    pub text: bool,

    /// Whichever of --json/--text appeared last on the command line.
    #[arg(skip)]
    last_output_flag: Option<OutputFormat>,

    /// Log level for stderr diagnostics (overrides GUI_AGENT_LOG).
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Available commands for gui-agent.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a GUI task through a model provider.
    ///
    /// Starts a persisted session unless --stateless is given.
    #[command(alias = "exec", alias = "run")]
    Execute(ExecuteArgs),

    /// Continue an existing session.
    ///
    /// Uses the latest active session when --session-id is omitted.
    #[command(name = "continue", alias = "cont")]
    Continue(ContinueArgs),

    /// Show the device's foreground app and recent notifications.
    Status(StatusArgs),

    /// Tap a coordinate directly, without model planning.
    #[command(alias = "click")]
    Tap(TapArgs),

    /// List connected devices.
    Devices,

    /// List active sessions, or purge/delete stored ones.
    Sessions(SessionsArgs),

    /// List available model providers and whether they are configured.
    Providers,
}

/// Arguments for the `execute` command.
#[derive(Parser, Debug)]
pub struct ExecuteArgs {
    /// Task description to execute.
    #[arg(short, long)]
    pub task: String,

    /// Model provider (local/stepfun/zhipu/qwen or a custom one from config).
    #[arg(short, long)]
    pub provider: Option<String>,

    /// ADB device ID.
    #[arg(short, long)]
    pub device_id: Option<String>,

    /// Maximum execution steps.
    #[arg(short, long, allow_negative_numbers = true)]
    pub max_steps: Option<i64>,

    /// Operation timeout in seconds. If omitted, use config default.
    #[arg(long, allow_negative_numbers = true)]
    pub timeout_sec: Option<i64>,

    /// One-shot mode: new conversation each call, no session persistence,
    /// no forced Home reset.
    #[arg(long, alias = "no-session")]
    pub stateless: bool,

    /// Extra JSON object forwarded to the adapter.
    #[arg(short, long)]
    pub extra_info: Option<String>,
}

/// Arguments for the `continue` command.
#[derive(Parser, Debug)]
pub struct ContinueArgs {
    /// Session ID (latest active session when omitted).
    #[arg(short, long)]
    pub session_id: Option<String>,

    /// Reply to a question the agent asked.
    #[arg(short, long)]
    pub reply: Option<String>,

    /// New task description (defaults to the session's task).
    #[arg(short, long)]
    pub task: Option<String>,

    /// ADB device ID (narrows the latest-session lookup).
    #[arg(short, long)]
    pub device_id: Option<String>,

    /// Maximum execution steps.
    #[arg(short, long, allow_negative_numbers = true)]
    pub max_steps: Option<i64>,

    /// Operation timeout in seconds. If omitted, use config default.
    #[arg(long, allow_negative_numbers = true)]
    pub timeout_sec: Option<i64>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// ADB device ID.
    #[arg(short, long)]
    pub device_id: Option<String>,
}

/// Arguments for the `tap` command.
#[derive(Parser, Debug)]
pub struct TapArgs {
    /// X coordinate. In auto mode, 0..1 is treated as ratio if both x/y are in range.
    #[arg(long, allow_negative_numbers = true)]
    pub x: f64,

    /// Y coordinate. In auto mode, 0..1 is treated as ratio if both x/y are in range.
    #[arg(long, allow_negative_numbers = true)]
    pub y: f64,

    /// Coordinate space for x/y: auto, pixel, or ratio.
    #[arg(long, default_value = "auto")]
    pub coord_space: String,

    /// ADB device ID.
    #[arg(short, long)]
    pub device_id: Option<String>,

    /// Delay after the tap before capturing the post-tap screenshot (milliseconds).
    #[arg(long, default_value_t = 350, allow_negative_numbers = true)]
    pub post_delay_ms: i64,

    /// Operation timeout in seconds. If omitted, use config default.
    #[arg(long, allow_negative_numbers = true)]
    pub timeout_sec: Option<i64>,
}

/// Arguments for the `sessions` command.
#[derive(Parser, Debug)]
pub struct SessionsArgs {
    /// Remove every session older than the configured expiry.
    #[arg(long, conflicts_with = "delete")]
    pub purge_expired: bool,

    /// Delete one session by ID.
    #[arg(long, value_name = "SESSION_ID")]
    pub delete: Option<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::try_parse_args_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Parse `args`, remembering the order of the output flags.
    ///
    /// Global flags given on both sides of the subcommand are merged by clap,
    /// so the last of `--json`/`--text` is taken from the raw arguments.
    pub fn try_parse_args_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut cli = Cli::try_parse_from(args.iter().cloned())?;
        cli.last_output_flag = last_output_flag(&args);
        Ok(cli)
    }

    pub fn output_format(&self) -> OutputFormat {
        match (self.json, self.text) {
            (true, true) => self.last_output_flag.unwrap_or(OutputFormat::Json),
            (_, true) => OutputFormat::Text,
            _ => OutputFormat::Json,
        }
    }
}

fn last_output_flag(args: &[OsString]) -> Option<OutputFormat> {
    args.iter()
        .take_while(|arg| *arg != "--")
        .filter_map(|arg| match arg.to_str() {
            Some("--json") => Some(OutputFormat::Json),
            Some("--text") => Some(OutputFormat::Text),
            _ => None,
        })
        .last()
}
