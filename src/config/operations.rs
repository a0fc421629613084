//! Config loading, environment expansion and validation.

use super::model::Config;
use super::types::state_dir;
use crate::error::{GuiAgentError, Result};
use regex::{Captures, Regex};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid env reference regex"));

impl Config {
    /// Path of the per-user config file.
    pub fn user_config_path() -> PathBuf {
        state_dir().join("config.yaml")
    }

    /// Resolve and load the effective configuration.
    ///
    /// An explicit path must exist. Without one, the per-user config is used
    /// when present, otherwise built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(GuiAgentError::Config(format!(
                    "config file not found: '{}'",
                    path.display()
                )));
            }
            return Self::load(path);
        }

        let user = Self::user_config_path();
        if user.exists() {
            return Self::load(&user);
        }
        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GuiAgentError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "loading config");
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// `${VAR}` references in any string value are replaced from the
    /// environment (unset variables become empty), and `~` in paths is
    /// expanded to the home directory.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)
            .map_err(|e| GuiAgentError::Config(format!("failed to parse config YAML: {}", e)))?;

        let mut config = if raw.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(expand_env(raw))
                .map_err(|e| GuiAgentError::Config(format!("invalid config: {}", e)))?
        };

        config.session.storage_dir = expand_home(&config.session.storage_dir);
        config.output.dir = expand_home(&config.output.dir);
        if let Some(path) = config.events.path.take() {
            config.events.path = Some(expand_home(&path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GuiAgentError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// - `default_max_steps` must be positive
    /// - `session.expire_seconds` must be positive
    /// - `default_operation_timeout_sec`, when set, must be positive
    pub fn validate(&self) -> Result<()> {
        if self.default_max_steps == 0 {
            return Err(GuiAgentError::Config(
                "default_max_steps must be greater than 0".to_string(),
            ));
        }

        if self.session.expire_seconds == 0 {
            return Err(GuiAgentError::Config(
                "session.expire_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(timeout) = self.default_operation_timeout_sec
            && timeout <= 0
        {
            return Err(GuiAgentError::Config(format!(
                "default_operation_timeout_sec must be greater than 0 (found {})",
                timeout
            )));
        }

        if self.default_provider.trim().is_empty() && !self.tap_only_mode {
            return Err(GuiAgentError::Config(
                "default_provider must not be empty unless tap_only_mode is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Replace `${VAR}` references in every string of a YAML tree.
fn expand_env(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_str(&s)),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(expand_env).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, expand_env(v)))
                .collect(),
        ),
        Value::Tagged(mut tagged) => {
            tagged.value = expand_env(tagged.value);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

fn expand_env_str(s: &str) -> String {
    ENV_REF
        .replace_all(s, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
