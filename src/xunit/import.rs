use super::{ReportBatchProcessor, ReportOutcome, TestBatchStatistics};
use crate::bridge::PersistenceBridge;
use crate::error::Result;
use crate::recovery::{Outcome, RecoveryPolicy};
use crate::report::{Report, ReportLocator};
use crate::sink::Unit;
use crate::transform::FormatTransformer;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

/// Per-run totals of the test report import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub located: usize,
    pub parsed: usize,
    pub empty: usize,
    pub skipped: usize,
    pub statistics: Option<TestBatchStatistics>,
    pub published: bool,
}

/// Locate, transform, parse, aggregate and publish unit-test reports.
#[derive(Debug, Clone)]
pub struct XunitImport {
    report_paths: Vec<String>,
    transformation: Option<String>,
    encoding: &'static Encoding,
    policy: RecoveryPolicy,
}

impl XunitImport {
    pub fn new(report_paths: Vec<String>) -> Self {
        Self {
            report_paths,
            transformation: None,
            encoding: UTF_8,
            policy: RecoveryPolicy::default(),
        }
    }

    pub fn transformation(mut self, transformation: Option<String>) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn execute(
        &self,
        locator: &dyn ReportLocator,
        bridge: &mut PersistenceBridge<'_>,
        project: &Unit,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let paths = locator.locate(&self.report_paths)?;
        summary.located = paths.len();
        if paths.is_empty() {
            tracing::debug!("No reports found, nothing to process");
            return Ok(summary);
        }

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let opened = Report::open(&path, self.encoding);
            if let Err(err) = &opened {
                tracing::error!("Cannot open report '{}': {}", path.display(), err);
            }
            match self.policy.handle(opened)? {
                Outcome::Completed(report) => reports.push(report),
                Outcome::Recovered(_) => summary.skipped += 1,
            }
        }

        tracing::info!("Parsing 'xUnit' format");
        let transformer = FormatTransformer::new(self.transformation.clone());
        let batch = ReportBatchProcessor::new(transformer, self.policy).process(&reports)?;
        for outcome in &batch.outcomes {
            match outcome {
                ReportOutcome::Parsed { .. } => summary.parsed += 1,
                ReportOutcome::Empty { .. } => summary.empty += 1,
                ReportOutcome::Skipped { .. } => summary.skipped += 1,
            }
        }

        let statistics = batch.statistics();
        summary.statistics = Some(statistics);
        if statistics.is_publishable() {
            bridge.save_test_statistics(project, &statistics)?;
            summary.published = true;
        } else {
            tracing::debug!("The reports contain no testcases");
        }
        Ok(summary)
    }
}
