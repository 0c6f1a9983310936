//! Translation of statistics, metrics and issues into sink calls

use crate::analysis::SourceFileAnalysis;
use crate::error::{ReportError, Result};
use crate::issues::{Issue, Location, RuleKey, normalize_line};
use crate::metrics::{MetricKey, MetricValue};
use crate::recovery::{Outcome, RecoveryPolicy};
use crate::sink::{FileSystem, InputFile, MeasurementSink, NewIssue, SinkLocation, Unit};
use crate::xunit::TestBatchStatistics;
use serde::Serialize;

/// Counters of what reached the sink during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub metrics_saved: usize,
    pub metrics_rejected: usize,
    pub issues_saved: usize,
    pub issues_rejected: usize,
    pub files_skipped: usize,
}

/// Every sink call of a run goes through here.
///
/// A rejected call is logged and handed to the recovery policy; under the
/// tolerant policy sibling calls still go ahead.
pub struct PersistenceBridge<'a> {
    sink: &'a mut dyn MeasurementSink,
    files: &'a dyn FileSystem,
    policy: RecoveryPolicy,
    repository: String,
    summary: PublishSummary,
}

impl<'a> PersistenceBridge<'a> {
    pub fn new(
        sink: &'a mut dyn MeasurementSink,
        files: &'a dyn FileSystem,
        policy: RecoveryPolicy,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            files,
            policy,
            repository: repository.into(),
            summary: PublishSummary::default(),
        }
    }

    pub fn summary(&self) -> &PublishSummary {
        &self.summary
    }

    pub fn into_summary(self) -> PublishSummary {
        self.summary
    }

    /// Save the five test metrics on the project, unless no test executed.
    pub fn save_test_statistics(&mut self, project: &Unit, stats: &TestBatchStatistics) -> Result<()> {
        if !stats.is_publishable() {
            tracing::debug!("The reports contain no testcases");
            return Ok(());
        }
        for (metric, value) in stats.metrics() {
            self.save_metric(project, metric, value)?;
        }
        tracing::info!(
            "Saved test statistics: {} tests, {} errors, {} failures, {} skipped, {} ms",
            stats.tests,
            stats.errors,
            stats.failures,
            stats.skipped,
            stats.time_ms
        );
        Ok(())
    }

    /// Save metrics and issues of every analyzed file.
    ///
    /// Nothing is emitted when no file was analyzed. Multi-location issues
    /// are removed from their file once committed.
    pub fn save_analysis(&mut self, files: &mut [SourceFileAnalysis]) -> Result<()> {
        if files.is_empty() {
            tracing::info!("No analyzed source files, skipping metric publication");
            return Ok(());
        }
        for file in files.iter_mut() {
            self.save_file(file)?;
        }
        Ok(())
    }

    fn save_file(&mut self, file: &mut SourceFileAnalysis) -> Result<()> {
        let Some(input) = self.files.input_file(&file.path) else {
            let err = ReportError::sink_rejection(
                format!("results for '{}'", file.path.display()),
                "file is not part of the project",
            );
            tracing::error!("{}", err);
            self.policy.handle::<()>(Err(err))?;
            self.summary.files_skipped += 1;
            return Ok(());
        };
        tracing::debug!("Saving results of '{}'", input.key);

        let unit = Unit::File(input.clone());
        for metric in MetricKey::FILE_METRICS {
            self.save_metric(&unit, metric, MetricValue::Int(file.metric(metric)))?;
        }

        for issue in file.issues.iter().filter(|issue| !issue.is_multi_location()) {
            self.save_issue(&input, issue)?;
        }
        // A committed multi-location issue leaves the file immediately
        let mut index = 0;
        while index < file.issues.len() {
            if !file.issues[index].is_multi_location() {
                index += 1;
                continue;
            }
            if self.save_issue(&input, &file.issues[index])? {
                file.issues.remove(index);
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    fn save_metric(&mut self, unit: &Unit, metric: MetricKey, value: MetricValue) -> Result<()> {
        let result = self.sink.save_metric(unit, metric, value);
        if let Err(err) = &result {
            tracing::error!(
                "Cannot save measure {} : '{}', ignoring measure",
                metric.key().to_uppercase(),
                err
            );
        }
        match self.policy.handle(result)? {
            Outcome::Completed(()) => self.summary.metrics_saved += 1,
            Outcome::Recovered(_) => self.summary.metrics_rejected += 1,
        }
        Ok(())
    }

    /// Returns whether the issue was committed.
    fn save_issue(&mut self, file: &InputFile, issue: &Issue) -> Result<bool> {
        let rule = RuleKey::new(&self.repository, issue.rule());
        let result = self
            .new_issue(file, issue, rule.clone())
            .and_then(|new_issue| self.sink.save_issue(new_issue));
        if let Err(err) = &result {
            tracing::error!("Cannot save issue {} on '{}': {}", rule, file.key, err);
        }
        match self.policy.handle(result)? {
            Outcome::Completed(()) => {
                self.summary.issues_saved += 1;
                Ok(true)
            }
            Outcome::Recovered(_) => {
                self.summary.issues_rejected += 1;
                Ok(false)
            }
        }
    }

    fn new_issue(&self, file: &InputFile, issue: &Issue, rule: RuleKey) -> Result<NewIssue> {
        match issue {
            Issue::SingleLocation { line, message, .. } => Ok(NewIssue {
                rule,
                message: message.clone(),
                primary: SinkLocation {
                    file: file.clone(),
                    line: normalize_line(*line),
                    message: None,
                },
                secondary: Vec::new(),
            }),
            Issue::MultiLocation {
                message, locations, ..
            } => {
                let mut resolved = locations.iter().map(|location| self.location(file, location));
                let primary = resolved.next().ok_or_else(|| {
                    ReportError::sink_rejection(format!("issue {}", rule), "multi-location issue has no location")
                })??;
                let secondary = resolved.collect::<Result<Vec<_>>>()?;
                Ok(NewIssue {
                    rule,
                    message: message.clone(),
                    primary,
                    secondary,
                })
            }
        }
    }

    fn location(&self, owner: &InputFile, location: &Location) -> Result<SinkLocation> {
        let file = match &location.file {
            None => owner.clone(),
            Some(path) => self.files.input_file(path).ok_or_else(|| {
                ReportError::sink_rejection(
                    format!("location '{}'", path.display()),
                    "file is not part of the project",
                )
            })?,
        };
        Ok(SinkLocation {
            file,
            line: normalize_line(location.line),
            message: location.message.clone(),
        })
    }
}
