//! Run-wide error recovery policy
//!
//! One value, read once per run, decides whether a failed unit of work (a
//! report, a metric save, an issue save) aborts the run or is skipped.

use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};

/// Strict aborts on the first failure, tolerant logs and skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    Strict,
    #[default]
    Tolerant,
}

/// Result of a unit of work that did not abort the run.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Recovered(ReportError),
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Recovered(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

impl RecoveryPolicy {
    /// Maps the `error_recovery_enabled` flag onto a policy.
    pub fn from_flag(recovery_enabled: bool) -> Self {
        if recovery_enabled {
            RecoveryPolicy::Tolerant
        } else {
            RecoveryPolicy::Strict
        }
    }

    pub fn is_tolerant(self) -> bool {
        self == RecoveryPolicy::Tolerant
    }

    /// Classifies a result. `Err` is returned only for fatal failures.
    ///
    /// Empty reports are recovered in both modes.
    pub fn handle<T>(self, result: Result<T>) -> Result<Outcome<T>> {
        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(err) if err.is_empty_report() || self.is_tolerant() => Ok(Outcome::Recovered(err)),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn malformed() -> Result<u32> {
        Err(ReportError::malformed(&PathBuf::from("r.xml"), "bad"))
    }

    fn empty() -> Result<u32> {
        Err(ReportError::EmptyReport {
            path: PathBuf::from("r.xml"),
        })
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(RecoveryPolicy::from_flag(true), RecoveryPolicy::Tolerant);
        assert_eq!(RecoveryPolicy::from_flag(false), RecoveryPolicy::Strict);
        assert_eq!(RecoveryPolicy::default(), RecoveryPolicy::Tolerant);
    }

    #[test]
    fn test_tolerant_recovers_failures() {
        let outcome = RecoveryPolicy::Tolerant.handle(malformed()).unwrap();
        assert!(matches!(outcome, Outcome::Recovered(ReportError::MalformedReport { .. })));
    }

    #[test]
    fn test_strict_propagates_failures() {
        assert!(RecoveryPolicy::Strict.handle(malformed()).is_err());
    }

    #[test]
    fn test_empty_report_is_always_recovered() {
        for policy in [RecoveryPolicy::Strict, RecoveryPolicy::Tolerant] {
            let outcome = policy.handle(empty()).unwrap();
            assert!(!outcome.is_completed());
        }
    }

    #[test]
    fn test_success_passes_through() {
        let outcome = RecoveryPolicy::Strict.handle(Ok(7)).unwrap();
        assert_eq!(outcome.completed(), Some(7));
    }
}
