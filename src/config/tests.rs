//! Tests for config functionality.

use crate::config::types::{default_output_dir, default_session_dir};
use crate::config::{Config, expand_home};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.default_provider, "local");
    assert!(!config.tap_only_mode);
    assert_eq!(config.default_device_id, None);
    assert_eq!(config.default_max_steps, 20);
    assert_eq!(config.default_operation_timeout_sec, None);
    assert_eq!(config.cleanup_grace_ms, 1500);
    assert_eq!(config.session.expire_seconds, 3600);
    assert_eq!(config.session.storage_dir, default_session_dir());
    assert_eq!(config.output.dir, default_output_dir());
    assert!(config.output.save_screenshot);
    assert!(config.output.enable_caption);
    assert_eq!(config.device.adb_path, "adb");
    assert!(config.events.enabled);
    assert!(config.providers.is_empty());
}

#[test]
fn test_parse_empty_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
default_provider: zhipu
default_max_steps: 8
session:
  expire_seconds: 600
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.default_provider, "zhipu");
    assert_eq!(config.default_max_steps, 8);
    assert_eq!(config.session.expire_seconds, 600);

    // Unspecified values keep their defaults, including within a section.
    assert_eq!(config.session.storage_dir, default_session_dir());
    assert_eq!(config.cleanup_grace_ms, 1500);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
default_provider: qwen
tap_only_mode: false
default_device_id: emulator-5554
default_max_steps: 12
default_operation_timeout_sec: 90
cleanup_grace_ms: 500
adapter_command: "gui-bridge --adapter {adapter}"
session:
  storage_dir: /var/lib/gui-agent/sessions
  expire_seconds: 120
output:
  dir: /tmp/gui-agent-out
  save_screenshot: false
  enable_caption: false
  caption_command: "captioner --model small"
providers:
  qwen:
    api_key: sk-test
    base_url: https://example.invalid/v1
    command: "qwen-bridge {model_name}"
device:
  adb_path: /opt/platform-tools/adb
events:
  enabled: false
  path: /tmp/gui-agent-events.ndjson
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.default_device(), Some("emulator-5554"));
    assert_eq!(config.default_operation_timeout_sec, Some(90));
    assert_eq!(config.cleanup_grace().as_millis(), 500);
    assert_eq!(config.session_ttl().as_secs(), 120);
    assert_eq!(
        config.session.storage_dir,
        PathBuf::from("/var/lib/gui-agent/sessions")
    );
    assert!(!config.output.save_screenshot);
    assert_eq!(
        config.output.caption_command.as_deref(),
        Some("captioner --model small")
    );
    let qwen = config.provider("qwen").unwrap();
    assert_eq!(qwen.configured_api_key(), Some("sk-test"));
    assert_eq!(qwen.command.as_deref(), Some("qwen-bridge {model_name}"));
    assert_eq!(config.device.adb_path, "/opt/platform-tools/adb");
    assert!(!config.events.enabled);
    assert_eq!(
        config.events.resolved_path(),
        PathBuf::from("/tmp/gui-agent-events.ndjson")
    );
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
default_provider: local
gui_agent_forge_path: /somewhere
state:
  caption_model: whatever
"#;
    assert!(Config::from_yaml(yaml).is_ok());
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let err = Config::from_yaml("default_max_steps: [unclosed").unwrap_err();
    assert_eq!(err.code(), "config_error");
}

#[test]
fn test_wrong_type_is_config_error() {
    let err = Config::from_yaml("default_max_steps: many").unwrap_err();
    assert_eq!(err.code(), "config_error");
}

#[test]
fn test_validate_rejects_zero_max_steps() {
    let err = Config::from_yaml("default_max_steps: 0").unwrap_err();
    assert!(err.to_string().contains("default_max_steps"));
}

#[test]
fn test_validate_rejects_non_positive_timeout() {
    let err = Config::from_yaml("default_operation_timeout_sec: 0").unwrap_err();
    assert!(err.to_string().contains("default_operation_timeout_sec"));
}

#[test]
fn test_validate_rejects_zero_expiry() {
    let err = Config::from_yaml("session:\n  expire_seconds: 0").unwrap_err();
    assert!(err.to_string().contains("expire_seconds"));
}

#[test]
fn test_blank_provider_allowed_in_tap_only_mode() {
    assert!(Config::from_yaml("default_provider: ''").is_err());
    assert!(Config::from_yaml("default_provider: ''\ntap_only_mode: true").is_ok());
}

#[test]
#[serial]
fn test_env_references_are_expanded() {
    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("GUI_AGENT_TEST_ZHIPU_KEY", "zk-123");
        std::env::remove_var("GUI_AGENT_TEST_UNSET");
    }

    let yaml = r#"
providers:
  zhipu:
    api_key: ${GUI_AGENT_TEST_ZHIPU_KEY}
    base_url: "https://${GUI_AGENT_TEST_UNSET}example.invalid"
"#;
    let config = Config::from_yaml(yaml).unwrap();
    let zhipu = config.provider("zhipu").unwrap();
    assert_eq!(zhipu.api_key.as_deref(), Some("zk-123"));
    assert_eq!(zhipu.base_url.as_deref(), Some("https://example.invalid"));

    unsafe {
        std::env::remove_var("GUI_AGENT_TEST_ZHIPU_KEY");
    }
}

#[test]
fn test_home_expansion() {
    let expanded = expand_home(Path::new("~/sessions"));
    if let Some(home) = dirs::home_dir() {
        assert_eq!(expanded, home.join("sessions"));
    }
    assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    assert_eq!(expand_home(Path::new("rel/~x")), PathBuf::from("rel/~x"));
}

#[test]
fn test_tilde_paths_in_yaml_are_expanded() {
    let config = Config::from_yaml("output:\n  dir: ~/gui-out").unwrap();
    assert!(!config.output.dir.starts_with("~"));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "default_provider: stepfun\n").unwrap();

    let config = Config::resolve(Some(&path)).unwrap();
    assert_eq!(config.default_provider, "stepfun");
}

#[test]
fn test_explicit_missing_config_is_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::resolve(Some(&dir.path().join("missing.yaml"))).unwrap_err();
    assert_eq!(err.code(), "config_error");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_yaml_roundtrip_preserves_values() {
    let config = Config::from_yaml("default_provider: zhipu\ncleanup_grace_ms: 250").unwrap();
    let reparsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(reparsed, config);
}
