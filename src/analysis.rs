//! Source-analysis result set produced by the external analyzer

use crate::issues::Issue;
use crate::metrics::MetricKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResultSet {
    #[serde(default)]
    pub files: Vec<SourceFileAnalysis>,
}

/// Metrics and issues computed for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileAnalysis {
    pub path: PathBuf,
    #[serde(default)]
    pub metrics: BTreeMap<String, i64>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl AnalysisResultSet {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis result set '{}'", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid analysis result set '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let result_set: Self = serde_json::from_str(content)?;
        for file in &result_set.files {
            for key in file.metrics.keys().filter(|key| MetricKey::from_key(key).is_none()) {
                tracing::warn!("Unknown metric '{}' for '{}', ignoring", key, file.path.display());
            }
        }
        Ok(result_set)
    }

    pub fn pending_multi_location(&self) -> usize {
        self.files.iter().map(SourceFileAnalysis::pending_multi_location).sum()
    }
}

impl SourceFileAnalysis {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metrics: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// Metric value, 0 when the analyzer did not report it.
    pub fn metric(&self, key: MetricKey) -> i64 {
        self.metrics.get(key.key()).copied().unwrap_or(0)
    }

    pub fn pending_multi_location(&self) -> usize {
        self.issues.iter().filter(|issue| issue.is_multi_location()).count()
    }
}
