//! Configuration model for gui-agent.
//!
//! This module defines the Config struct that represents
//! `~/.gui_agent_skill/config.yaml` (or the file named by `--config`). It
//! supports forward-compatible YAML parsing (unknown fields are ignored),
//! `${VAR}` environment expansion, sensible defaults for optional fields, and
//! validation of config values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use operations::expand_home;
pub use types::{DeviceConfig, EventsConfig, OutputConfig, ProviderConfig, SessionConfig, state_dir};
