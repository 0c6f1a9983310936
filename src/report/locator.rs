use crate::error::{ReportError, Result};
use crate::shared::glob::expand_file_patterns;
use std::path::{Path, PathBuf};

/// Resolves configured report path patterns to concrete files.
pub trait ReportLocator {
    fn locate(&self, patterns: &[String]) -> Result<Vec<PathBuf>>;
}

/// Locator that expands Ant-style patterns relative to a project root.
#[derive(Debug, Clone)]
pub struct GlobLocator {
    base_dir: PathBuf,
}

impl GlobLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl ReportLocator for GlobLocator {
    fn locate(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let reports = expand_file_patterns(patterns, &self.base_dir)
            .map_err(|e| ReportError::Config(format!("invalid report path pattern: {}", e)))?;
        tracing::debug!(
            "Located {} report(s) under '{}'",
            reports.len(),
            self.base_dir.display()
        );
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_in_discovery_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a")).unwrap();
        fs::create_dir_all(temp_dir.path().join("b")).unwrap();
        fs::write(temp_dir.path().join("a/1.xml"), "").unwrap();
        fs::write(temp_dir.path().join("b/2.xml"), "").unwrap();

        let locator = GlobLocator::new(temp_dir.path());
        let found = locator
            .locate(&["b/*.xml".to_string(), "a/*.xml".to_string()])
            .unwrap();
        assert_eq!(
            found,
            vec![temp_dir.path().join("b/2.xml"), temp_dir.path().join("a/1.xml")]
        );
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let locator = GlobLocator::new(temp_dir.path());
        let err = locator.locate(&["reports/[.xml".to_string()]).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }
}
