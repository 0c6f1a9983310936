//! Configuration management for Reportflow
//!
//! Settings are layered with figment (see [`core`]): embedded defaults, user
//! config, repository config, an explicit config file, `REPORTFLOW_*`
//! environment variables and finally command line overrides.

pub mod core;
pub mod smart_load;

pub use self::core::{
    AnalysisOverrides, CliOverrides, CompilationOverrides, SinkOverrides, XunitOverrides,
};

use crate::recovery::RecoveryPolicy;
use crate::report::lookup_encoding;
use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for Reportflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportflowConfig {
    /// Tolerant (true) or strict (false) error recovery
    #[serde(default = "default_true")]
    pub error_recovery_enabled: bool,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub xunit: XunitConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub compilation: CompilationConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Key of the project unit test statistics are saved on
    #[serde(default = "default_project_key")]
    pub key: String,

    /// Directory report patterns and analyzed files are relative to
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

/// Unit-test report import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XunitConfig {
    #[serde(default)]
    pub report_paths: Vec<String>,

    /// Rule set name, file or URL applied before parsing
    #[serde(default)]
    pub transformation: Option<String>,

    #[serde(default = "default_encoding")]
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rule repository issues are raised against
    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default)]
    pub result_set: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationConfig {
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub build_logs: Vec<String>,

    #[serde(default = "default_encoding")]
    pub build_log_encoding: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// JSON-lines destination; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_project_key() -> String {
    "project".to_string()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_repository() -> String {
    "cxx".to_string()
}

impl Default for ReportflowConfig {
    fn default() -> Self {
        Self {
            error_recovery_enabled: true,
            project: ProjectConfig::default(),
            xunit: XunitConfig::default(),
            analysis: AnalysisConfig::default(),
            compilation: CompilationConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            key: default_project_key(),
            base_dir: default_base_dir(),
        }
    }
}

impl Default for XunitConfig {
    fn default() -> Self {
        Self {
            report_paths: Vec::new(),
            transformation: None,
            encoding: default_encoding(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            result_set: None,
        }
    }
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            database: None,
            build_logs: Vec::new(),
            build_log_encoding: default_encoding(),
        }
    }
}

impl ReportflowConfig {
    /// Check values serde cannot: charset labels and required keys.
    pub fn validate(&self) -> Result<()> {
        lookup_encoding(&self.xunit.encoding).context("Invalid xunit.encoding")?;
        lookup_encoding(&self.compilation.build_log_encoding)
            .context("Invalid compilation.build_log_encoding")?;
        if self.analysis.repository.trim().is_empty() {
            bail!("analysis.repository must not be empty");
        }
        if self.project.key.trim().is_empty() {
            bail!("project.key must not be empty");
        }
        Ok(())
    }

    pub fn policy(&self) -> RecoveryPolicy {
        RecoveryPolicy::from_flag(self.error_recovery_enabled)
    }

    pub fn xunit_encoding(&self) -> Result<&'static Encoding> {
        Ok(lookup_encoding(&self.xunit.encoding)?)
    }

    pub fn build_log_encoding(&self) -> Result<&'static Encoding> {
        Ok(lookup_encoding(&self.compilation.build_log_encoding)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportflowConfig::default();
        assert!(config.error_recovery_enabled);
        assert_eq!(config.policy(), RecoveryPolicy::Tolerant);
        assert_eq!(config.project.key, "project");
        assert_eq!(config.analysis.repository, "cxx");
        assert_eq!(config.xunit_encoding().unwrap(), encoding_rs::UTF_8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: ReportflowConfig = toml::from_str(
            r#"
            error_recovery_enabled = false

            [xunit]
            report_paths = ["build/TEST-*.xml"]
            "#,
        )
        .unwrap();

        assert_eq!(config.policy(), RecoveryPolicy::Strict);
        assert_eq!(config.xunit.report_paths, vec!["build/TEST-*.xml"]);
        assert_eq!(config.xunit.encoding, "UTF-8");
        assert_eq!(config.compilation.build_log_encoding, "UTF-8");
    }

    #[test]
    fn test_validate_rejects_unknown_encoding() {
        let mut config = ReportflowConfig::default();
        config.xunit.encoding = "klingon-8".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("klingon-8"));

        let mut config = ReportflowConfig::default();
        config.compilation.build_log_encoding = "windows-1252".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_repository() {
        let mut config = ReportflowConfig::default();
        config.analysis.repository = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
