//! Error taxonomy for report ingestion and publication

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The report resolved to zero bytes (or no root element). Never fatal.
    #[error("report '{}' is empty", path.display())]
    EmptyReport { path: PathBuf },

    #[error("malformed report '{}': {reason}", path.display())]
    MalformedReport { path: PathBuf, reason: String },

    /// A structurally valid field failed value validation, e.g. a negative time.
    #[error("invalid value in report '{}': {reason}", path.display())]
    ValueDomain { path: PathBuf, reason: String },

    #[error("cannot transform report '{}' using '{transformation}': {reason}", path.display())]
    TransformFailure {
        path: PathBuf,
        transformation: String,
        reason: String,
    },

    #[error("sink rejected {what}: {reason}")]
    SinkRejection { what: String, reason: String },

    #[error("I/O error: {source} (path: {})", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        ReportError::MalformedReport {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn value_domain(path: &Path, reason: impl Into<String>) -> Self {
        ReportError::ValueDomain {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(source: std::io::Error, path: &Path) -> Self {
        ReportError::Io {
            source,
            path: path.to_path_buf(),
        }
    }

    pub fn sink_rejection(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::SinkRejection {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn is_empty_report(&self) -> bool {
        matches!(self, ReportError::EmptyReport { .. })
    }

    /// Path of the report this error belongs to, if any.
    pub fn report_path(&self) -> Option<&Path> {
        match self {
            ReportError::EmptyReport { path }
            | ReportError::MalformedReport { path, .. }
            | ReportError::ValueDomain { path, .. }
            | ReportError::TransformFailure { path, .. }
            | ReportError::Io { path, .. } => Some(path),
            ReportError::SinkRejection { .. } | ReportError::Config(_) => None,
        }
    }
}
