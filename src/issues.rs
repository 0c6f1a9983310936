//! Issue model: diagnostics with one or more source locations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    pub repository: String,
    pub rule: String,
}

impl RuleKey {
    pub fn new(repository: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.rule)
    }
}

/// One location of a multi-location issue. Without `file` it refers to the
/// source file that owns the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Location {
    pub fn at_line(line: i64) -> Self {
        Self {
            file: None,
            line: Some(line),
            message: None,
        }
    }
}

/// A diagnostic produced by the analyzer for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    SingleLocation {
        rule: String,
        #[serde(default)]
        line: Option<i64>,
        message: String,
    },
    /// The first location is the primary one, the rest are secondary.
    MultiLocation {
        rule: String,
        message: String,
        #[serde(default)]
        locations: Vec<Location>,
    },
}

impl Issue {
    pub fn rule(&self) -> &str {
        match self {
            Issue::SingleLocation { rule, .. } | Issue::MultiLocation { rule, .. } => rule,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Issue::SingleLocation { message, .. } | Issue::MultiLocation { message, .. } => message,
        }
    }

    pub fn is_multi_location(&self) -> bool {
        matches!(self, Issue::MultiLocation { .. })
    }
}

/// 1-based line; absent or non-positive lines become line 1.
pub fn normalize_line(line: Option<i64>) -> u32 {
    match line {
        Some(line) if line > 0 => u32::try_from(line).unwrap_or(u32::MAX),
        _ => 1,
    }
}
