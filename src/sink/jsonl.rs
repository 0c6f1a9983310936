use super::{MeasurementSink, NewIssue, SubmittedMetrics, Unit};
use crate::error::{ReportError, Result};
use crate::metrics::{MetricKey, MetricValue};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Line<'a> {
    Measure {
        unit: &'a Unit,
        metric: MetricKey,
        value: MetricValue,
    },
    Issue(&'a NewIssue),
}

/// Sink writing one JSON object per accepted call.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    submitted: SubmittedMetrics,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            submitted: SubmittedMetrics::default(),
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| ReportError::sink_rejection("flush", e.to_string()))?;
        Ok(self.writer)
    }

    fn write_line(&mut self, what: impl FnOnce() -> String, line: &Line<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line)
            .map_err(|e| e.to_string())
            .and_then(|()| writeln!(self.writer).map_err(|e| e.to_string()))
            .map_err(|reason| ReportError::sink_rejection(what(), reason))?;
        self.written += 1;
        Ok(())
    }
}

impl<W: Write> MeasurementSink for JsonLinesSink<W> {
    fn save_metric(&mut self, unit: &Unit, metric: MetricKey, value: MetricValue) -> Result<()> {
        self.submitted.register(unit, metric)?;
        self.write_line(
            || format!("measure {} on {}", metric, unit),
            &Line::Measure {
                unit,
                metric,
                value,
            },
        )
    }

    fn save_issue(&mut self, issue: NewIssue) -> Result<()> {
        let rule = issue.rule.to_string();
        self.write_line(|| format!("issue {}", rule), &Line::Issue(&issue))
    }
}
