//! Metric keys and values understood by the sink

use serde::Serialize;
use std::fmt;

/// How the sink treats a metric across the unit hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Rolled up by the sink automatically
    Core,
    /// Computed per unit, never emitted for units that were not analyzed
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    Tests,
    TestErrors,
    TestFailures,
    SkippedTests,
    TestExecutionTime,

    Ncloc,
    Statements,
    Functions,
    Classes,
    Complexity,
    CognitiveComplexity,
    CommentLines,

    PublicApi,
    PublicUndocumentedApi,
    ComplexFunctions,
    ComplexFunctionsLoc,
    LocInFunctions,
    BigFunctions,
    BigFunctionsLoc,
}

impl MetricKey {
    /// Per-file metrics in the order they are saved: core first, then derived.
    pub const FILE_METRICS: [MetricKey; 14] = [
        MetricKey::Ncloc,
        MetricKey::Statements,
        MetricKey::Functions,
        MetricKey::Classes,
        MetricKey::Complexity,
        MetricKey::CognitiveComplexity,
        MetricKey::CommentLines,
        MetricKey::PublicApi,
        MetricKey::PublicUndocumentedApi,
        MetricKey::ComplexFunctions,
        MetricKey::ComplexFunctionsLoc,
        MetricKey::LocInFunctions,
        MetricKey::BigFunctions,
        MetricKey::BigFunctionsLoc,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MetricKey::Tests => "tests",
            MetricKey::TestErrors => "test_errors",
            MetricKey::TestFailures => "test_failures",
            MetricKey::SkippedTests => "skipped_tests",
            MetricKey::TestExecutionTime => "test_execution_time",
            MetricKey::Ncloc => "ncloc",
            MetricKey::Statements => "statements",
            MetricKey::Functions => "functions",
            MetricKey::Classes => "classes",
            MetricKey::Complexity => "complexity",
            MetricKey::CognitiveComplexity => "cognitive_complexity",
            MetricKey::CommentLines => "comment_lines",
            MetricKey::PublicApi => "public_api",
            MetricKey::PublicUndocumentedApi => "public_undocumented_api",
            MetricKey::ComplexFunctions => "complex_functions",
            MetricKey::ComplexFunctionsLoc => "complex_functions_loc",
            MetricKey::LocInFunctions => "loc_in_functions",
            MetricKey::BigFunctions => "big_functions",
            MetricKey::BigFunctionsLoc => "big_functions_loc",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            MetricKey::PublicApi
            | MetricKey::PublicUndocumentedApi
            | MetricKey::ComplexFunctions
            | MetricKey::ComplexFunctionsLoc
            | MetricKey::LocInFunctions
            | MetricKey::BigFunctions
            | MetricKey::BigFunctionsLoc => MetricKind::Derived,
            _ => MetricKind::Core,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [
            MetricKey::Tests,
            MetricKey::TestErrors,
            MetricKey::TestFailures,
            MetricKey::SkippedTests,
            MetricKey::TestExecutionTime,
        ]
        .into_iter()
        .chain(Self::FILE_METRICS)
        .find(|metric| metric.key() == key)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for MetricKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Typed metric value. Durations are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Duration(u64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(value) => write!(f, "{}", value),
            MetricValue::Duration(ms) => write!(f, "{}ms", ms),
        }
    }
}
