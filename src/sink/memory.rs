use super::{MeasurementSink, NewIssue, SubmittedMetrics, Unit};
use crate::error::{ReportError, Result};
use crate::metrics::{MetricKey, MetricValue};
use std::collections::HashSet;

/// Sink that keeps every accepted call in memory.
///
/// Individual metric keys or rules can be configured to be rejected.
#[derive(Debug, Default)]
pub struct InMemorySink {
    metrics: Vec<(Unit, MetricKey, MetricValue)>,
    issues: Vec<NewIssue>,
    submitted: SubmittedMetrics,
    rejected_metrics: HashSet<MetricKey>,
    rejected_rules: HashSet<String>,
    calls: usize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_metric(mut self, metric: MetricKey) -> Self {
        self.rejected_metrics.insert(metric);
        self
    }

    pub fn reject_rule(mut self, rule: impl Into<String>) -> Self {
        self.rejected_rules.insert(rule.into());
        self
    }

    pub fn metrics(&self) -> &[(Unit, MetricKey, MetricValue)] {
        &self.metrics
    }

    pub fn metric(&self, unit_key: &str, metric: MetricKey) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(unit, key, _)| unit.key() == unit_key && *key == metric)
            .map(|(_, _, value)| *value)
    }

    pub fn issues(&self) -> &[NewIssue] {
        &self.issues
    }

    /// Every call made, accepted or rejected.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl MeasurementSink for InMemorySink {
    fn save_metric(&mut self, unit: &Unit, metric: MetricKey, value: MetricValue) -> Result<()> {
        self.calls += 1;
        if self.rejected_metrics.contains(&metric) {
            return Err(ReportError::sink_rejection(
                format!("measure {} on {}", metric, unit),
                "metric is not accepted for this unit",
            ));
        }
        self.submitted.register(unit, metric)?;
        self.metrics.push((unit.clone(), metric, value));
        Ok(())
    }

    fn save_issue(&mut self, issue: NewIssue) -> Result<()> {
        self.calls += 1;
        if self.rejected_rules.contains(&issue.rule.rule) {
            return Err(ReportError::sink_rejection(
                format!("issue {}", issue.rule),
                "rule is not active",
            ));
        }
        self.issues.push(issue);
        Ok(())
    }
}
