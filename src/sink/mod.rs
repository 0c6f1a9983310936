//! Boundary to the external measurement and issue store

mod jsonl;
mod memory;

pub use jsonl::JsonLinesSink;
pub use memory::InMemorySink;

use crate::error::{ReportError, Result};
use crate::issues::RuleKey;
use crate::metrics::MetricKey;
use crate::metrics::MetricValue;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A source file known to the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InputFile {
    /// Project-relative key with `/` separators
    pub key: String,
    pub path: PathBuf,
}

/// Unit a metric is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Unit {
    Project { key: String },
    File(InputFile),
}

impl Unit {
    pub fn project(key: impl Into<String>) -> Self {
        Unit::Project { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Unit::Project { key } => key,
            Unit::File(file) => &file.key,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Project { key } => write!(f, "project '{}'", key),
            Unit::File(file) => write!(f, "file '{}'", file.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkLocation {
    pub file: InputFile,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Issue as handed to the sink: primary location plus ordered secondaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub rule: RuleKey,
    pub message: String,
    pub primary: SinkLocation,
    pub secondary: Vec<SinkLocation>,
}

impl NewIssue {
    pub fn unit(&self) -> &InputFile {
        &self.primary.file
    }
}

/// Fire-and-commit store for metrics and issues.
pub trait MeasurementSink {
    fn save_metric(&mut self, unit: &Unit, metric: MetricKey, value: MetricValue) -> Result<()>;

    fn save_issue(&mut self, issue: NewIssue) -> Result<()>;
}

/// Resolves analyzer paths to project files.
pub trait FileSystem {
    fn input_file(&self, path: &Path) -> Option<InputFile>;
}

/// Files under a project base directory that exist on disk.
#[derive(Debug, Clone)]
pub struct BaseDirFileSystem {
    base_dir: PathBuf,
}

impl BaseDirFileSystem {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl FileSystem for BaseDirFileSystem {
    fn input_file(&self, path: &Path) -> Option<InputFile> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        if !absolute.is_file() {
            return None;
        }
        let relative = absolute.strip_prefix(&self.base_dir).unwrap_or(&absolute);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(InputFile {
            key,
            path: absolute,
        })
    }
}

/// (unit, metric) pairs already accepted; a second submission is rejected.
#[derive(Debug, Default)]
struct SubmittedMetrics {
    seen: HashSet<(Unit, MetricKey)>,
}

impl SubmittedMetrics {
    fn register(&mut self, unit: &Unit, metric: MetricKey) -> Result<()> {
        if !self.seen.insert((unit.clone(), metric)) {
            return Err(ReportError::sink_rejection(
                format!("measure {} on {}", metric, unit),
                "can't save the same measure twice",
            ));
        }
        Ok(())
    }
}
