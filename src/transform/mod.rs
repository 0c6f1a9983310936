//! Optional rewrite of vendor report dialects into the canonical schema

mod source;
mod stylesheet;

pub use source::{bundled_names, bundled_stylesheets};
pub use stylesheet::{CaseStatus, Stylesheet};

use crate::error::{ReportError, Result};
use crate::report::Report;
use encoding_rs::UTF_8;
use std::ffi::OsString;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const TRANSFORMED_SUFFIX: &str = ".after_transform";

/// Applies the configured transformation, if any, to each report.
///
/// The rule set is resolved on first use and reused for the rest of the run.
#[derive(Debug, Default)]
pub struct FormatTransformer {
    identifier: Option<String>,
    stylesheet: Option<Stylesheet>,
}

impl FormatTransformer {
    pub fn new(identifier: Option<String>) -> Self {
        Self {
            identifier: identifier.filter(|id| !id.trim().is_empty()),
            stylesheet: None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Produce the canonical report for `report`.
    ///
    /// Without an identifier, or for an empty report, the input is returned
    /// unchanged. Otherwise the result is a new report next to the input,
    /// written completely or not at all.
    pub fn transform(&mut self, report: &Report) -> Result<Report> {
        let Some(identifier) = self.identifier.clone() else {
            tracing::debug!("Transformation skipped: no transformation given");
            return Ok(report.clone());
        };
        if report.is_empty() {
            return Ok(report.clone());
        }

        tracing::debug!("Transforming the report using '{}'", identifier);
        let failure = |reason: String| ReportError::TransformFailure {
            path: report.path().to_path_buf(),
            transformation: identifier.clone(),
            reason,
        };

        let stylesheet = self.stylesheet(&identifier).map_err(|e| failure(format!("{:#}", e)))?;
        let target = transformed_path(report.path());
        let directory = report
            .path()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(directory).map_err(|e| ReportError::io(e, directory))?;
        let input = report.reader()?;
        let cases = stylesheet
            .apply(input, BufWriter::new(temp.as_file_mut()))
            .map_err(|e| failure(format!("{:#}", e)))?;
        temp.persist(&target)
            .map_err(|e| ReportError::io(e.error, &target))?;

        tracing::debug!(
            "Transformed '{}' into '{}' ({} testcases)",
            report.path().display(),
            target.display(),
            cases
        );
        Report::open(target, UTF_8)
    }

    fn stylesheet(&mut self, identifier: &str) -> anyhow::Result<&Stylesheet> {
        let stylesheet = match self.stylesheet.take() {
            Some(stylesheet) => stylesheet,
            None => source::load(identifier)?,
        };
        Ok(self.stylesheet.insert(stylesheet))
    }
}

/// `<report>.after_transform`
pub fn transformed_path(report: &Path) -> PathBuf {
    let mut path = OsString::from(report.as_os_str());
    path.push(TRANSFORMED_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryPolicy;
    use std::fs;
    use tempfile::TempDir;

    const CTEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Site Name="host">
  <Testing>
    <TestList><Test>./unit/parse</Test></TestList>
    <Test Status="passed">
      <Name>parse</Name><Path>./unit</Path>
      <Results>
        <NamedMeasurement type="numeric/double" name="Execution Time"><Value>0.25</Value></NamedMeasurement>
      </Results>
    </Test>
    <Test Status="failed">
      <Name>render</Name><Path>./unit</Path>
      <Results>
        <NamedMeasurement type="numeric/double" name="Execution Time"><Value>1.5</Value></NamedMeasurement>
        <NamedMeasurement type="text/string" name="Exit Code"><Value>Failed</Value></NamedMeasurement>
        <Measurement><Value>expected 3 got 4</Value></Measurement>
      </Results>
    </Test>
    <Test Status="notrun"><Name>slow</Name><Path>./unit</Path></Test>
  </Testing>
</Site>"#;

    fn report(dir: &TempDir, name: &str, content: &str) -> Report {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        Report::open(path, UTF_8).unwrap()
    }

    fn records(report: &Report) -> Vec<crate::xunit::TestCaseRecord> {
        crate::xunit::TestCaseReader::open(report)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_passthrough_without_identifier() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(&temp_dir, "junit.xml", "<testsuite><testcase name=\"a\"/></testsuite>");

        let mut transformer = FormatTransformer::new(None);
        let result = transformer.transform(&original).unwrap();
        assert_eq!(result.path(), original.path());
        assert_eq!(
            fs::read(result.path()).unwrap(),
            fs::read(original.path()).unwrap()
        );
    }

    #[test]
    fn test_blank_identifier_is_passthrough() {
        assert!(FormatTransformer::new(Some("  ".to_string())).identifier().is_none());
    }

    #[test]
    fn test_empty_report_is_not_transformed() {
        let temp_dir = TempDir::new().unwrap();
        let empty = report(&temp_dir, "empty.xml", "");
        let mut transformer = FormatTransformer::new(Some("ctest-to-junit".to_string()));
        let result = transformer.transform(&empty).unwrap();
        assert_eq!(result.path(), empty.path());
        assert!(!transformed_path(empty.path()).exists());
    }

    #[test]
    fn test_bundled_ctest_transformation() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(&temp_dir, "Test.xml", CTEST);
        let mut transformer = FormatTransformer::new(Some("ctest-to-junit".to_string()));

        let result = transformer.transform(&original).unwrap();
        assert_eq!(result.path(), temp_dir.path().join("Test.xml.after_transform"));

        let records = records(&result);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "parse");
        assert_eq!(records[0].time_ms, 250);
        assert!(records[1].is_failure());
        assert_eq!(records[1].diagnostic.as_deref(), Some("Failed\nexpected 3 got 4"));
        assert!(records[2].is_skipped());
    }

    #[test]
    fn test_bundled_boost_transformation() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(
            &temp_dir,
            "boost.xml",
            r#"<TestLog><TestSuite name="Master"><TestSuite name="math">
                <TestCase name="add"><TestingTime>1200</TestingTime></TestCase>
                <TestCase name="div"><Error file="math.cpp" line="12">check failed</Error><TestingTime>800</TestingTime></TestCase>
                <TestCase name="mod"><Exception file="math.cpp" line="20">unexpected</Exception></TestCase>
                <TestCase name="pow" skipped="yes" reason="disabled"/>
            </TestSuite></TestSuite></TestLog>"#,
        );
        let mut transformer = FormatTransformer::new(Some("boosttest-1.x-to-junit-1.0.xsl".to_string()));
        let records = records(&transformer.transform(&original).unwrap());

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].classname.as_deref(), Some("math"));
        assert_eq!(records[0].time_ms, 1);
        assert!(records[1].is_failure());
        assert!(records[2].is_error());
        assert!(records[3].is_skipped());
    }

    #[test]
    fn test_bundled_cppunit_transformation() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(
            &temp_dir,
            "cppunit.xml",
            r#"<?xml version="1.0" encoding='ISO-8859-1' standalone='yes' ?>
<TestRun>
  <FailedTests>
    <FailedTest id="1"><Name>MathTest::testDiv</Name><FailureType>Assertion</FailureType><Message>equality assertion failed</Message></FailedTest>
    <FailedTest id="2"><Name>MathTest::testMod</Name><FailureType>Error</FailureType><Message>uncaught exception</Message></FailedTest>
  </FailedTests>
  <SuccessfulTests><Test id="3"><Name>MathTest::testAdd</Name></Test></SuccessfulTests>
  <Statistics><Tests>3</Tests></Statistics>
</TestRun>"#,
        );
        let mut transformer = FormatTransformer::new(Some("cppunit-1.x-to-junit-1.0".to_string()));
        let records = records(&transformer.transform(&original).unwrap());

        let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
        use crate::xunit::TestStatus;
        assert_eq!(
            statuses,
            vec![TestStatus::Failed, TestStatus::ErroredOut, TestStatus::Passed]
        );
    }

    #[test]
    fn test_malformed_input_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(&temp_dir, "Test.xml", "<Site><Testing><Test Status=\"passed\">");
        let mut transformer = FormatTransformer::new(Some("ctest-to-junit".to_string()));

        let err = transformer.transform(&original).unwrap_err();
        assert!(matches!(err, ReportError::TransformFailure { .. }));
        assert!(!transformed_path(original.path()).exists());
        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_non_xml_input_is_transform_failure() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(&temp_dir, "Test.xml", "Start testing: Oct 19 10:00 UTC\n");
        let mut transformer = FormatTransformer::new(Some("ctest-to-junit".to_string()));

        let err = transformer.transform(&original).unwrap_err();
        assert!(matches!(err, ReportError::TransformFailure { .. }));
        assert!(!transformed_path(original.path()).exists());
        assert!(RecoveryPolicy::Strict.handle(Err::<(), _>(err)).is_err());
    }

    #[test]
    fn test_unknown_transformation_is_transform_failure() {
        let temp_dir = TempDir::new().unwrap();
        let original = report(&temp_dir, "r.xml", "<x/>");
        let mut transformer = FormatTransformer::new(Some("does-not-exist".to_string()));
        let err = transformer.transform(&original).unwrap_err();
        assert!(matches!(
            err,
            ReportError::TransformFailure { ref transformation, .. } if transformation == "does-not-exist"
        ));
    }
}
