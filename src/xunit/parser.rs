//! Streaming parser for the canonical (JUnit-style) test report schema
//!
//! The document is never held in memory: records are produced one
//! `<testcase>` at a time as the underlying reader advances.

use super::{TestCaseRecord, TestStatus};
use crate::error::{ReportError, Result};
use crate::report::Report;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

const ROOT_ELEMENTS: [&str; 2] = ["testsuites", "testsuite"];

/// Lazy, finite, non-restartable sequence of test case records.
pub struct TestCaseReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    origin: PathBuf,
    open: Vec<String>,
    root_seen: bool,
    finished: bool,
}

impl TestCaseReader<Box<dyn BufRead>> {
    /// Open a located report for parsing.
    pub fn open(report: &Report) -> Result<Self> {
        if report.is_empty() {
            return Err(ReportError::EmptyReport {
                path: report.path().to_path_buf(),
            });
        }
        Self::new(report.reader()?, report.path())
    }
}

impl<R: BufRead> TestCaseReader<R> {
    /// Wrap a UTF-8 byte stream. A stream with zero bytes is an empty report.
    pub fn new(mut source: R, origin: &Path) -> Result<Self> {
        let is_empty = source
            .fill_buf()
            .map_err(|e| ReportError::io(e, origin))?
            .is_empty();
        if is_empty {
            return Err(ReportError::EmptyReport {
                path: origin.to_path_buf(),
            });
        }

        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        Ok(Self {
            reader,
            buf: Vec::new(),
            origin: origin.to_path_buf(),
            open: Vec::new(),
            root_seen: false,
            finished: false,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> ReportError {
        ReportError::malformed(&self.origin, reason)
    }

    fn next_event(&mut self) -> Result<Event<'static>> {
        let result = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => Ok(event.into_owned()),
            Err(err) => Err(err),
        };
        self.buf.clear();
        result.map_err(|err| {
            self.malformed(format!("{} (at byte {})", err, self.reader.buffer_position()))
        })
    }

    /// Root element checks, applied to every element opened at depth zero.
    fn enter_element(&mut self, name: &str) -> Result<()> {
        if !self.open.is_empty() {
            return Ok(());
        }
        if self.root_seen {
            return Err(self.malformed(format!("unexpected element <{}> after the root element", name)));
        }
        if !ROOT_ELEMENTS.contains(&name) {
            return Err(self.malformed(format!(
                "unexpected root element <{}>, expected <testsuites> or <testsuite>",
                name
            )));
        }
        self.root_seen = true;
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<TestCaseRecord>> {
        loop {
            match self.next_event()? {
                Event::Start(element) => {
                    let name = local_name(&element);
                    self.enter_element(&name)?;
                    if name == "testcase" {
                        return self.read_testcase(&element, false).map(Some);
                    }
                    self.open.push(name);
                }
                Event::Empty(element) => {
                    let name = local_name(&element);
                    self.enter_element(&name)?;
                    if name == "testcase" {
                        return self.read_testcase(&element, true).map(Some);
                    }
                }
                Event::End(_) => {
                    self.open.pop();
                }
                Event::Text(content) if self.open.is_empty() && !is_blank(&content) => {
                    return Err(self.malformed(format!(
                        "unexpected text outside the root element: '{}'",
                        excerpt(&content)
                    )));
                }
                Event::CData(_) if self.open.is_empty() => {
                    return Err(self.malformed("unexpected CDATA outside the root element"));
                }
                Event::Eof => {
                    if let Some(unclosed) = self.open.last() {
                        return Err(self.malformed(format!(
                            "unexpected end of document, <{}> is not closed",
                            unclosed
                        )));
                    }
                    if !self.root_seen {
                        return Err(ReportError::EmptyReport {
                            path: self.origin.clone(),
                        });
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn read_testcase(&mut self, element: &BytesStart<'_>, is_empty: bool) -> Result<TestCaseRecord> {
        let name = attribute(&self.origin, element, b"name")?.unwrap_or_default();
        let classname = attribute(&self.origin, element, b"classname")?;
        let time = attribute(&self.origin, element, b"time")?;
        let time_ms = parse_time(&self.origin, time.as_deref())?;

        let mut verdict = Verdict::default();
        if !is_empty {
            let mut depth = 0usize;
            loop {
                match self.next_event()? {
                    Event::Start(child) if depth == 0 => {
                        let message = attribute(&self.origin, &child, b"message")?;
                        let text = self.collect_text()?;
                        verdict.observe(&local_name(&child), message, text);
                    }
                    Event::Start(_) => depth += 1,
                    Event::Empty(child) if depth == 0 => {
                        let message = attribute(&self.origin, &child, b"message")?;
                        verdict.observe(&local_name(&child), message, String::new());
                    }
                    Event::End(_) if depth == 0 => break,
                    Event::End(_) => depth -= 1,
                    Event::Eof => {
                        return Err(self.malformed("unexpected end of document inside <testcase>"));
                    }
                    _ => {}
                }
            }
        }

        let (status, diagnostic) = verdict.resolve();
        Ok(TestCaseRecord {
            name,
            classname,
            status,
            time_ms,
            diagnostic,
        })
    }

    /// Concatenated text of the element just opened, consuming its end tag.
    fn collect_text(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.next_event()? {
                Event::Text(content) => {
                    let unescaped = content.unescape().map_err(|e| self.malformed(e.to_string()))?;
                    push_line(&mut text, &unescaped);
                }
                Event::CData(content) => {
                    let bytes = content.into_inner();
                    let decoded = std::str::from_utf8(&bytes)
                        .map_err(|e| self.malformed(format!("invalid UTF-8 in CDATA: {}", e)))?;
                    push_line(&mut text, decoded.trim());
                }
                Event::Start(_) => depth += 1,
                Event::End(_) if depth == 0 => return Ok(text),
                Event::End(_) => depth -= 1,
                Event::Eof => {
                    return Err(self.malformed("unexpected end of document inside <testcase>"));
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for TestCaseReader<R> {
    type Item = Result<TestCaseRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for TestCaseReader<R> {}

/// Status children seen on one testcase.
///
/// Precedence: skipped, then error, then failure, otherwise passed.
#[derive(Default)]
struct Verdict {
    skipped: Option<String>,
    error: Option<String>,
    failure: Option<String>,
}

impl Verdict {
    fn observe(&mut self, element: &str, message: Option<String>, text: String) {
        let slot = match element {
            "skipped" => &mut self.skipped,
            "error" => &mut self.error,
            "failure" => &mut self.failure,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(diagnostic_text(message, text));
        }
    }

    fn resolve(self) -> (TestStatus, Option<String>) {
        let (status, detail) = if let Some(detail) = self.skipped {
            (TestStatus::Skipped, detail)
        } else if let Some(detail) = self.error {
            (TestStatus::ErroredOut, detail)
        } else if let Some(detail) = self.failure {
            (TestStatus::Failed, detail)
        } else {
            return (TestStatus::Passed, None);
        };
        (status, Some(detail).filter(|d| !d.is_empty()))
    }
}

fn diagnostic_text(message: Option<String>, text: String) -> String {
    match message.filter(|m| !m.is_empty()) {
        Some(message) if text.is_empty() => message,
        Some(message) => format!("{}\n{}", message, text),
        None => text,
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}

fn is_blank(content: &[u8]) -> bool {
    content.iter().all(u8::is_ascii_whitespace)
}

/// First characters of stray content, for error messages.
fn excerpt(content: &[u8]) -> String {
    String::from_utf8_lossy(content).trim().chars().take(40).collect()
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute(origin: &Path, element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ReportError::malformed(origin, e.to_string()))?;
        if attr.key.local_name().as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| ReportError::malformed(origin, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Seconds (decimal, `,` grouping allowed) to whole milliseconds.
fn parse_time(origin: &Path, value: Option<&str>) -> Result<u64> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(0);
    };
    let seconds: f64 = raw
        .replace(',', "")
        .parse()
        .map_err(|_| ReportError::value_domain(origin, format!("time '{}' is not a number", raw)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ReportError::value_domain(
            origin,
            format!("time '{}' must be a non-negative number of seconds", raw),
        ));
    }
    Ok((seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryPolicy;

    fn parse(xml: &str) -> Result<Vec<TestCaseRecord>> {
        TestCaseReader::new(xml.as_bytes(), Path::new("report.xml"))?.collect()
    }

    const MIXED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="math" tests="5">
    <testcase name="add" classname="Math" time="0.010"/>
    <testcase name="sub" classname="Math" time="0.020"></testcase>
    <testcase name="mul" classname="Math" time="0.005">
      <system-out>ok</system-out>
    </testcase>
    <testcase name="div" classname="Math" time="0.007">
      <failure message="expected 2">Math.cpp:42</failure>
    </testcase>
    <testcase name="mod" classname="Math" time="0.003"><skipped/></testcase>
  </testsuite>
</testsuites>"#;

    #[test]
    fn test_parses_mixed_statuses() {
        let records = parse(MIXED).unwrap();
        let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                TestStatus::Passed,
                TestStatus::Passed,
                TestStatus::Passed,
                TestStatus::Failed,
                TestStatus::Skipped
            ]
        );
        let times: Vec<_> = records.iter().map(|r| r.time_ms).collect();
        assert_eq!(times, vec![10, 20, 5, 7, 3]);
        assert_eq!(records[3].diagnostic.as_deref(), Some("expected 2\nMath.cpp:42"));
        assert_eq!(records[0].classname.as_deref(), Some("Math"));
    }

    #[test]
    fn test_zero_bytes_is_empty_report() {
        let err = TestCaseReader::new(&b""[..], Path::new("empty.xml")).err().unwrap();
        assert!(err.is_empty_report());
    }

    #[test]
    fn test_prolog_only_is_empty_report() {
        let err = parse("<?xml version=\"1.0\"?>\n  \n").unwrap_err();
        assert!(err.is_empty_report());
    }

    #[test]
    fn test_text_without_root_is_malformed() {
        for content in ["this is not xml at all", "{\"json\": true}", "<?xml version=\"1.0\"?>\nhello"] {
            let err = parse(content).unwrap_err();
            assert!(matches!(err, ReportError::MalformedReport { .. }), "{:?}", content);
        }
    }

    #[test]
    fn test_text_after_root_is_malformed() {
        let err = parse("<testsuite><testcase name=\"a\"/></testsuite>trailing").unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport { .. }));
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_non_xml_report_aborts_strict_run() {
        let result = parse("plain text log");
        assert!(RecoveryPolicy::Strict.handle(result).is_err());
    }

    #[test]
    fn test_single_testsuite_root() {
        let records = parse(r#"<testsuite><testcase name="t" time="1.5"/></testsuite>"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_ms, 1500);
    }

    #[test]
    fn test_empty_root_yields_no_records() {
        assert!(parse("<testsuites/>").unwrap().is_empty());
    }

    #[test]
    fn test_unexpected_root_is_malformed() {
        let err = parse("<TestRun><Test/></TestRun>").unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport { .. }));
        assert!(err.to_string().contains("unexpected root element <TestRun>"));
    }

    #[test]
    fn test_unterminated_document_is_malformed() {
        let err = parse(r#"<testsuite><testcase name="a"/>"#).unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport { .. }));
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        let err = parse("<testsuite><testcase name=\"a\"></testsuite>").unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport { .. }));
    }

    #[test]
    fn test_records_before_a_malformation_are_yielded() {
        let mut reader =
            TestCaseReader::new(&br#"<testsuite><testcase name="a"/><oops"#[..], Path::new("r.xml")).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_negative_time_is_value_domain_error() {
        let err = parse(r#"<testsuite><testcase name="a" time="-1"/></testsuite>"#).unwrap_err();
        assert!(matches!(err, ReportError::ValueDomain { .. }));
    }

    #[test]
    fn test_non_numeric_time_is_value_domain_error() {
        for time in ["abc", "NaN", "inf"] {
            let xml = format!(r#"<testsuite><testcase name="a" time="{}"/></testsuite>"#, time);
            let err = parse(&xml).unwrap_err();
            assert!(matches!(err, ReportError::ValueDomain { .. }), "time {}", time);
        }
    }

    #[test]
    fn test_time_with_grouping_and_missing_time() {
        let records = parse(
            r#"<testsuite><testcase name="a" time="1,234.5"/><testcase name="b" time=""/><testcase name="c"/></testsuite>"#,
        )
        .unwrap();
        let times: Vec<_> = records.iter().map(|r| r.time_ms).collect();
        assert_eq!(times, vec![1_234_500, 0, 0]);
    }

    #[test]
    fn test_status_precedence() {
        let records = parse(
            r#"<testsuite>
                <testcase name="a"><failure message="f"/><error message="e"/></testcase>
                <testcase name="b"><failure/><skipped/></testcase>
                <testcase name="c"><error><![CDATA[boom]]></error></testcase>
            </testsuite>"#,
        )
        .unwrap();
        assert_eq!(records[0].status, TestStatus::ErroredOut);
        assert_eq!(records[0].diagnostic.as_deref(), Some("e"));
        assert_eq!(records[1].status, TestStatus::Skipped);
        assert_eq!(records[2].status, TestStatus::ErroredOut);
        assert_eq!(records[2].diagnostic.as_deref(), Some("boom"));
    }

    #[test]
    fn test_nested_suites() {
        let records = parse(
            r#"<testsuites><testsuite name="outer"><properties><property name="k" value="v"/></properties>
               <testsuite name="inner"><testcase name="deep"/></testsuite></testsuite></testsuites>"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "deep");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let bytes = b"<testsuite><testcase name=\"\xFF\xFE\"/></testsuite>";
        let result: Result<Vec<_>> = TestCaseReader::new(&bytes[..], Path::new("r.xml")).unwrap().collect();
        assert!(matches!(result.unwrap_err(), ReportError::MalformedReport { .. }));
    }
}
