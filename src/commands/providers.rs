//! Implementation of the `gui-agent providers` command.

use crate::config::Config;
use crate::providers::list_providers;
use serde_json::{Value, json};

/// List the provider catalog with per-provider configuration status.
///
/// Works without a config: every provider is then reported unconfigured,
/// tap-only mode off and no default provider.
pub fn cmd_providers(config: Option<&Config>, config_error: Option<&str>) -> Value {
    json!({
        "success": true,
        "providers": list_providers(config, config_error),
        "tap_only_mode": config.is_some_and(|c| c.tap_only_mode),
        "default_provider": config.map(|c| c.default_provider.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn reports_catalog_and_config_flags() {
        let mut config = Config::default();
        config.tap_only_mode = true;
        config.default_provider = "zhipu".into();
        config.providers.insert(
            "mybridge".into(),
            ProviderConfig {
                model_name: Some("tiny".into()),
                ..Default::default()
            },
        );

        let record = cmd_providers(Some(&config), None);
        assert_eq!(record["success"], true);
        assert_eq!(record["tap_only_mode"], true);
        assert_eq!(record["default_provider"], "zhipu");

        let names: Vec<&str> = record["providers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["local", "stepfun", "zhipu", "qwen", "mybridge"]);
    }

    #[test]
    fn missing_config_marks_everything_unconfigured() {
        let record = cmd_providers(None, Some("config error: bad yaml"));
        for provider in record["providers"].as_array().unwrap() {
            assert_eq!(provider["configured"], false);
            assert_eq!(provider["config_error"], "config error: bad yaml");
        }
    }
}
