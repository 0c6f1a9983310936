//! Unit-test report ingestion
//!
//! Reports flow through [`FormatTransformer`](crate::transform::FormatTransformer)
//! into the streaming [`parser`], are batched by [`ReportBatchProcessor`] and
//! folded into [`TestBatchStatistics`].

mod batch;
mod import;
pub mod parser;
mod stats;

pub use batch::{BatchResult, ReportBatchProcessor, ReportOutcome};
pub use import::{ImportSummary, XunitImport};
pub use parser::TestCaseReader;
pub use stats::TestBatchStatistics;

use serde::Serialize;

/// Status of a single test case, exactly one per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    ErroredOut,
    Skipped,
}

/// One parsed `<testcase>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseRecord {
    pub name: String,
    pub classname: Option<String>,
    pub status: TestStatus,
    /// Elapsed time in milliseconds
    pub time_ms: u64,
    pub diagnostic: Option<String>,
}

impl TestCaseRecord {
    pub fn new(name: impl Into<String>, status: TestStatus, time_ms: u64) -> Self {
        Self {
            name: name.into(),
            classname: None,
            status,
            time_ms,
            diagnostic: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TestStatus::Skipped
    }

    pub fn is_error(&self) -> bool {
        self.status == TestStatus::ErroredOut
    }

    pub fn is_failure(&self) -> bool {
        self.status == TestStatus::Failed
    }
}
