//! Model provider catalog and validation.
//!
//! Built-in providers describe which adapter kind and model they use and
//! which environment variable carries their API key. Providers that exist
//! only in config are accepted as custom providers.

use crate::config::Config;
use crate::error::{GuiAgentError, Result};
use serde::Serialize;

/// One built-in provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub adapter: &'static str,
    pub model_provider: Option<&'static str>,
    pub model_name: &'static str,
    pub description: &'static str,
    pub api_key_env: Option<&'static str>,
    pub api_base: &'static str,
}

impl ProviderSpec {
    pub fn requires_api_key(&self) -> bool {
        self.api_key_env.is_some()
    }
}

pub const BUILTIN_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "local",
        adapter: "gelab_local",
        model_provider: Some("local"),
        model_name: "gelab-zero-4b-preview",
        description: "Local GELab-Zero model served by Ollama",
        api_key_env: None,
        api_base: "http://localhost:11434/v1",
    },
    ProviderSpec {
        name: "stepfun",
        adapter: "gelab_local",
        model_provider: Some("stepfun"),
        model_name: "step-1v-8k",
        description: "StepFun Step-1V vision model",
        api_key_env: Some("STEPFUN_API_KEY"),
        api_base: "https://api.stepfun.com/v1",
    },
    ProviderSpec {
        name: "zhipu",
        adapter: "open_autoglm",
        model_provider: None,
        model_name: "glm-4.5v",
        description: "Zhipu AI GLM-4.5V vision model",
        api_key_env: Some("ZHIPUAI_API_KEY"),
        api_base: "https://open.bigmodel.cn/api/paas/v4/",
    },
    ProviderSpec {
        name: "qwen",
        adapter: "http",
        model_provider: None,
        model_name: "qwen-vl-max",
        description: "Alibaba Tongyi Qwen-VL vision model",
        api_key_env: Some("DASHSCOPE_API_KEY"),
        api_base: "https://dashscope.aliyuncs.com/compatible-mode/v1",
    },
];

pub fn builtin(name: &str) -> Option<&'static ProviderSpec> {
    BUILTIN_PROVIDERS.iter().find(|p| p.name == name)
}

/// Effective settings for one provider: config overrides on top of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProvider {
    pub name: String,
    pub adapter: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip)]
    pub api_key_env: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Merge the catalog entry (if any) with `providers.<name>` from config.
pub fn resolve_provider(name: &str, config: &Config) -> Result<ResolvedProvider> {
    let spec = builtin(name);
    let overrides = config.provider(name);
    if spec.is_none() && overrides.is_none() {
        return Err(GuiAgentError::ProviderUnavailable(format!(
            "Unknown provider: {}",
            name
        )));
    }
    let overrides = overrides.cloned().unwrap_or_default();

    Ok(ResolvedProvider {
        name: name.to_string(),
        adapter: overrides
            .adapter
            .clone()
            .or_else(|| spec.map(|s| s.adapter.to_string()))
            .unwrap_or_else(|| "gelab_local".to_string()),
        model_name: overrides
            .model_name
            .clone()
            .or_else(|| spec.map(|s| s.model_name.to_string()))
            .unwrap_or_default(),
        model_provider: overrides
            .model_provider
            .clone()
            .or_else(|| spec.and_then(|s| s.model_provider.map(str::to_string))),
        base_url: overrides
            .base_url
            .clone()
            .or_else(|| spec.map(|s| s.api_base.to_string())),
        api_key_env: spec.and_then(|s| s.api_key_env.map(str::to_string)),
        api_key: resolve_api_key(name, config),
    })
}

/// API key for `name`: the provider's env var wins over the config value.
pub fn resolve_api_key(name: &str, config: &Config) -> Option<String> {
    let from_env = builtin(name)
        .and_then(|s| s.api_key_env)
        .and_then(|var| std::env::var(var).ok())
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
    from_env.or_else(|| {
        config
            .provider(name)
            .and_then(|p| p.configured_api_key())
            .map(str::to_string)
    })
}

/// Check that `name` is known and has the credentials it needs.
pub fn validate_provider(name: &str, config: &Config) -> Result<()> {
    let Some(spec) = builtin(name) else {
        if config.provider(name).is_some() {
            return Ok(());
        }
        return Err(GuiAgentError::ProviderUnavailable(format!(
            "Unknown provider: {}",
            name
        )));
    };

    if let Some(var) = spec.api_key_env
        && resolve_api_key(name, config).is_none()
    {
        return Err(GuiAgentError::ProviderUnavailable(format!(
            "Missing API key: set {} env var or configure providers.{}.api_key in config",
            var, name
        )));
    }
    Ok(())
}

/// Catalog entry as reported by the `providers` command.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderListing {
    pub name: String,
    pub description: String,
    pub adapter: String,
    pub model_name: String,
    pub requires_api_key: bool,
    pub api_key_env: String,
    /// Whether the provider passes validation under the current config.
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_error: Option<String>,
}

/// Built-in providers followed by custom ones from config.
///
/// Without a config every provider is reported as unconfigured with
/// `config_error` explaining why.
pub fn list_providers(config: Option<&Config>, config_error: Option<&str>) -> Vec<ProviderListing> {
    let status = |name: &str| match config {
        Some(config) => match validate_provider(name, config) {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        },
        None => (
            false,
            Some(config_error.unwrap_or("configuration unavailable").to_string()),
        ),
    };

    let mut listings: Vec<ProviderListing> = BUILTIN_PROVIDERS
        .iter()
        .map(|spec| {
            let (configured, config_error) = status(spec.name);
            ProviderListing {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                adapter: spec.adapter.to_string(),
                model_name: spec.model_name.to_string(),
                requires_api_key: spec.requires_api_key(),
                api_key_env: spec.api_key_env.unwrap_or_default().to_string(),
                configured,
                config_error,
            }
        })
        .collect();

    if let Some(config) = config {
        for (name, custom) in &config.providers {
            if builtin(name).is_some() {
                continue;
            }
            let (configured, config_error) = status(name);
            listings.push(ProviderListing {
                name: name.clone(),
                description: "Custom provider from config".to_string(),
                adapter: custom.adapter.clone().unwrap_or_default(),
                model_name: custom.model_name.clone().unwrap_or_default(),
                requires_api_key: false,
                api_key_env: String::new(),
                configured,
                config_error,
            });
        }
    }
    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use serial_test::serial;

    fn config_with(name: &str, provider: ProviderConfig) -> Config {
        let mut config = Config::default();
        config.providers.insert(name.to_string(), provider);
        config
    }

    #[test]
    fn local_needs_no_key() {
        assert!(validate_provider("local", &Config::default()).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = validate_provider("mystery", &Config::default()).unwrap_err();
        assert_eq!(err.code(), "provider_unavailable");
        assert_eq!(err.to_string(), "Unknown provider: mystery");
    }

    #[test]
    fn custom_provider_from_config_is_accepted() {
        let config = config_with("lab", ProviderConfig::default());
        assert!(validate_provider("lab", &config).is_ok());
    }

    #[test]
    #[serial]
    fn missing_key_names_env_var_and_config_key() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::remove_var("ZHIPUAI_API_KEY") };

        let err = validate_provider("zhipu", &Config::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ZHIPUAI_API_KEY"));
        assert!(msg.contains("providers.zhipu.api_key"));
    }

    #[test]
    #[serial]
    fn config_key_satisfies_requirement() {
        unsafe { std::env::remove_var("DASHSCOPE_API_KEY") };
        let config = config_with(
            "qwen",
            ProviderConfig {
                api_key: Some("sk-config".into()),
                ..Default::default()
            },
        );

        assert!(validate_provider("qwen", &config).is_ok());
        assert_eq!(resolve_api_key("qwen", &config).as_deref(), Some("sk-config"));
    }

    #[test]
    #[serial]
    fn env_key_wins_over_config_key() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::set_var("STEPFUN_API_KEY", "sk-env") };
        let config = config_with(
            "stepfun",
            ProviderConfig {
                api_key: Some("sk-config".into()),
                ..Default::default()
            },
        );

        assert_eq!(resolve_api_key("stepfun", &config).as_deref(), Some("sk-env"));
        unsafe { std::env::remove_var("STEPFUN_API_KEY") };
    }

    #[test]
    fn resolve_merges_overrides_over_catalog() {
        let config = config_with(
            "zhipu",
            ProviderConfig {
                model_name: Some("glm-4.6v".into()),
                ..Default::default()
            },
        );
        let resolved = resolve_provider("zhipu", &config).unwrap();
        assert_eq!(resolved.adapter, "open_autoglm");
        assert_eq!(resolved.model_name, "glm-4.6v");
        assert_eq!(
            resolved.base_url.as_deref(),
            Some("https://open.bigmodel.cn/api/paas/v4/")
        );
        assert_eq!(resolved.api_key_env.as_deref(), Some("ZHIPUAI_API_KEY"));
    }

    #[test]
    fn listing_includes_custom_providers() {
        let config = config_with(
            "lab",
            ProviderConfig {
                adapter: Some("http".into()),
                ..Default::default()
            },
        );
        let listings = list_providers(Some(&config), None);
        let names: Vec<&str> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["local", "stepfun", "zhipu", "qwen", "lab"]);
        assert!(listings[0].configured);
        assert_eq!(listings[4].adapter, "http");
    }

    #[test]
    fn listing_without_config_reports_error() {
        let listings = list_providers(None, Some("config error: bad yaml"));
        assert_eq!(listings.len(), BUILTIN_PROVIDERS.len());
        assert!(listings.iter().all(|l| !l.configured));
        assert_eq!(
            listings[0].config_error.as_deref(),
            Some("config error: bad yaml")
        );
    }
}
