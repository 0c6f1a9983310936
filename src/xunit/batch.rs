use super::{TestBatchStatistics, TestCaseReader};
use crate::error::{ReportError, Result};
use crate::recovery::{Outcome, RecoveryPolicy};
use crate::report::Report;
use crate::transform::FormatTransformer;
use std::path::{Path, PathBuf};

/// What happened to one report of the batch.
#[derive(Debug)]
pub enum ReportOutcome {
    Parsed { report: PathBuf, records: u64 },
    Empty { report: PathBuf },
    Skipped { report: PathBuf, error: ReportError },
}

impl ReportOutcome {
    pub fn report(&self) -> &Path {
        match self {
            ReportOutcome::Parsed { report, .. }
            | ReportOutcome::Empty { report }
            | ReportOutcome::Skipped { report, .. } => report,
        }
    }
}

/// Running counters over every parsed report, plus one outcome per report
/// in discovery order. Records are folded as they are read, never kept.
#[derive(Debug, Default)]
pub struct BatchResult {
    totals: TestBatchStatistics,
    pub outcomes: Vec<ReportOutcome>,
}

impl BatchResult {
    pub fn statistics(&self) -> TestBatchStatistics {
        self.totals.finish()
    }
}

/// Drives transformation and parsing across all located reports.
pub struct ReportBatchProcessor {
    transformer: FormatTransformer,
    policy: RecoveryPolicy,
}

impl ReportBatchProcessor {
    pub fn new(transformer: FormatTransformer, policy: RecoveryPolicy) -> Self {
        Self { transformer, policy }
    }

    /// Process reports in order. A failed report contributes nothing;
    /// under the strict policy the first failure aborts the batch.
    pub fn process(&mut self, reports: &[Report]) -> Result<BatchResult> {
        let mut batch = BatchResult::default();

        for report in reports {
            tracing::info!("Processing report '{}'", report.path().display());
            let parsed = self.parse_report(report);
            if let Err(err) = &parsed {
                log_failure(report.path(), err);
            }

            let path = report.path().to_path_buf();
            match self.policy.handle(parsed)? {
                Outcome::Completed(counters) => {
                    tracing::debug!("Read {} testcases from '{}'", counters.tests, path.display());
                    batch.outcomes.push(ReportOutcome::Parsed {
                        report: path,
                        records: counters.tests,
                    });
                    batch.totals = batch.totals.merge(counters);
                }
                Outcome::Recovered(err) if err.is_empty_report() => {
                    batch.outcomes.push(ReportOutcome::Empty { report: path });
                }
                Outcome::Recovered(error) => {
                    batch.outcomes.push(ReportOutcome::Skipped { report: path, error });
                }
            }
        }

        Ok(batch)
    }

    /// Unfinished counters of one report; any failing record discards them all.
    fn parse_report(&mut self, report: &Report) -> Result<TestBatchStatistics> {
        let canonical = self.transformer.transform(report)?;
        TestCaseReader::open(&canonical)?
            .try_fold(TestBatchStatistics::default(), |counters, record| {
                record.map(|record| counters.accumulate(&record))
            })
    }
}

fn log_failure(report: &Path, err: &ReportError) {
    if err.is_empty_report() {
        tracing::warn!("The report '{}' seems to be empty, ignoring.", report.display());
        tracing::debug!("{}", err);
    } else {
        tracing::error!("Cannot process report '{}': {}", report.display(), err);
    }
}
