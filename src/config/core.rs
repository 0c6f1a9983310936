use super::ReportflowConfig;
use super::smart_load;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::PathBuf;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Values passed on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_recovery_enabled: Option<bool>,
    pub xunit: XunitOverrides,
    pub analysis: AnalysisOverrides,
    pub compilation: CompilationOverrides,
    pub sink: SinkOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct XunitOverrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub report_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_logs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SinkOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl ReportflowConfig {
    /// Load and validate the merged configuration.
    pub fn load(custom_config: Option<&str>, cli_overrides: Option<&CliOverrides>) -> Result<Self> {
        let figment = Self::figment(custom_config, cli_overrides);
        let config: ReportflowConfig = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        tracing::trace!("CONFIG LOAD: {:?}", config);
        Ok(config)
    }

    /// The full provider chain, lowest priority first.
    pub fn figment(custom_config: Option<&str>, cli_overrides: Option<&CliOverrides>) -> Figment {
        tracing::trace!("CONFIG LOAD: Starting");
        let user_config = Self::user_config_path();

        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // 1. Defaults (lowest)
            .merge(Toml::file(&user_config)) // 2. User config
            .merge(Json::file(user_config.with_extension("json")))
            .merge(Yaml::file(user_config.with_extension("yaml")))
            .merge(Toml::file("reportflow.toml")) // 3. Repo config
            .merge(Json::file("reportflow.json"))
            .merge(Yaml::file("reportflow.yaml"))
            .merge(Yaml::file("reportflow.yml"));

        if let Some(path) = custom_config {
            figment = figment.merge(smart_load::auto(path)); // 4. Custom config
        }

        figment = figment.merge(Env::prefixed("REPORTFLOW_").split("__")); // 5. Environment

        if let Some(overrides) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(overrides)); // 6. CLI (highest)
        }
        figment
    }

    /// Get a nested section of the merged configuration as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        let full = self.get_full_config()?;
        path.split('.')
            .try_fold(&full, |value, key| value.get(key))
            .cloned()
            .with_context(|| format!("No configuration section '{}'", path))
    }

    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn user_config_path() -> PathBuf {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config/reportflow/config.toml"),
            Err(_) => PathBuf::from("~/.config/reportflow/config.toml"),
        }
    }
}
