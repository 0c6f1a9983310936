use super::{TestCaseRecord, TestStatus};
use crate::metrics::{MetricKey, MetricValue};
use serde::Serialize;

/// Summary counters over every record of one run.
///
/// Built by folding records; `tests` only becomes the executed count once
/// [`finish`](Self::finish) has subtracted the skipped ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestBatchStatistics {
    pub tests: u64,
    pub errors: u64,
    pub failures: u64,
    pub skipped: u64,
    pub time_ms: u64,
}

impl TestBatchStatistics {
    /// Fold a record sequence into finished statistics.
    pub fn aggregate<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TestCaseRecord>,
    {
        records
            .into_iter()
            .fold(Self::default(), Self::accumulate)
            .finish()
    }

    /// Add one record. `tests` counts every record seen until `finish`.
    pub fn accumulate(mut self, record: &TestCaseRecord) -> Self {
        self.tests += 1;
        match record.status {
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::ErroredOut => self.errors += 1,
            TestStatus::Failed => self.failures += 1,
            TestStatus::Passed => {}
        }
        self.time_ms = self.time_ms.saturating_add(record.time_ms);
        self
    }

    /// Combine running counters of two record sequences (before `finish`).
    pub fn merge(self, other: Self) -> Self {
        Self {
            tests: self.tests + other.tests,
            errors: self.errors + other.errors,
            failures: self.failures + other.failures,
            skipped: self.skipped + other.skipped,
            time_ms: self.time_ms.saturating_add(other.time_ms),
        }
    }

    pub fn finish(mut self) -> Self {
        self.tests -= self.skipped;
        self
    }

    /// Statistics are only published when at least one test executed.
    pub fn is_publishable(&self) -> bool {
        self.tests > 0
    }

    pub fn metrics(&self) -> [(MetricKey, MetricValue); 5] {
        [
            (MetricKey::Tests, MetricValue::Int(self.tests as i64)),
            (MetricKey::TestErrors, MetricValue::Int(self.errors as i64)),
            (MetricKey::TestFailures, MetricValue::Int(self.failures as i64)),
            (MetricKey::SkippedTests, MetricValue::Int(self.skipped as i64)),
            (MetricKey::TestExecutionTime, MetricValue::Duration(self.time_ms)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(cases: &[(TestStatus, u64)]) -> Vec<TestCaseRecord> {
        cases
            .iter()
            .enumerate()
            .map(|(i, (status, time))| TestCaseRecord::new(format!("t{}", i), *status, *time))
            .collect()
    }

    #[test]
    fn test_mixed_batch() {
        let records = records(&[
            (TestStatus::Passed, 10),
            (TestStatus::Passed, 20),
            (TestStatus::Passed, 5),
            (TestStatus::Failed, 7),
            (TestStatus::Skipped, 3),
        ]);
        let stats = TestBatchStatistics::aggregate(&records);
        assert_eq!(
            stats,
            TestBatchStatistics {
                tests: 4,
                errors: 0,
                failures: 1,
                skipped: 1,
                time_ms: 45,
            }
        );
        assert!(stats.is_publishable());
    }

    #[test]
    fn test_counts_partition_the_records() {
        let statuses = [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::ErroredOut,
            TestStatus::Skipped,
        ];
        for len in 0..12 {
            let records: Vec<_> = (0..len)
                .map(|i| TestCaseRecord::new("t", statuses[(i * 7 + len) % 4], i as u64))
                .collect();
            let stats = TestBatchStatistics::aggregate(&records);
            let not_skipped = records.iter().filter(|r| !r.is_skipped()).count() as u64;

            assert_eq!(stats.tests + stats.skipped, records.len() as u64);
            assert_eq!(stats.tests, not_skipped);
            assert_eq!(stats.time_ms, records.iter().map(|r| r.time_ms).sum::<u64>());
        }
    }

    #[test]
    fn test_only_skipped_is_not_publishable() {
        let records = records(&[(TestStatus::Skipped, 4), (TestStatus::Skipped, 6)]);
        let stats = TestBatchStatistics::aggregate(&records);
        assert_eq!(stats.tests, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.time_ms, 10);
        assert!(!stats.is_publishable());
    }

    #[test]
    fn test_empty_batch() {
        let stats = TestBatchStatistics::aggregate(&Vec::<TestCaseRecord>::new());
        assert_eq!(stats, TestBatchStatistics::default());
        assert!(!stats.is_publishable());
    }

    #[test]
    fn test_merged_counters_match_single_fold() {
        let first = records(&[(TestStatus::Passed, 10), (TestStatus::Skipped, 5)]);
        let second = records(&[(TestStatus::Failed, 7), (TestStatus::ErroredOut, 3)]);
        let fold = |records: &[TestCaseRecord]| {
            records
                .iter()
                .fold(TestBatchStatistics::default(), TestBatchStatistics::accumulate)
        };

        let merged = fold(&first).merge(fold(&second)).finish();
        let all: Vec<_> = first.iter().chain(&second).cloned().collect();
        assert_eq!(merged, TestBatchStatistics::aggregate(&all));
        assert_eq!(merged.tests, 3);
        assert_eq!(merged.time_ms, 25);
    }

    #[test]
    fn test_metrics_keys() {
        let stats = TestBatchStatistics {
            tests: 3,
            errors: 1,
            failures: 0,
            skipped: 2,
            time_ms: 1500,
        };
        let metrics = stats.metrics();
        assert_eq!(metrics[0], (MetricKey::Tests, MetricValue::Int(3)));
        assert_eq!(metrics[4], (MetricKey::TestExecutionTime, MetricValue::Duration(1500)));
    }
}
