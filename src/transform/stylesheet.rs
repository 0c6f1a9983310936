//! TOML rule sets that rewrite a vendor test report into canonical JUnit XML
//!
//! A rule set names the vendor elements that represent one test (`select`)
//! and a small path expression for every canonical field. The vendor document
//! is streamed; only the subtree of a selected element is ever kept in memory.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Passed,
    Failure,
    Error,
    Skipped,
}

impl CaseStatus {
    fn element(self) -> Option<&'static str> {
        match self {
            CaseStatus::Passed => None,
            CaseStatus::Failure => Some("failure"),
            CaseStatus::Error => Some("error"),
            CaseStatus::Skipped => Some("skipped"),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStylesheet {
    name: String,
    #[serde(default)]
    description: String,
    suite: Option<String>,
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    select: String,
    name: String,
    classname: Option<String>,
    time: Option<String>,
    #[serde(default = "default_time_scale")]
    time_scale: f64,
    #[serde(default)]
    status: Vec<RawCondition>,
    #[serde(default)]
    default_status: CaseStatus,
    message: Option<String>,
    detail: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    when: String,
    equals: Option<String>,
    status: CaseStatus,
}

fn default_time_scale() -> f64 {
    1.0
}

/// A compiled rule set.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    name: String,
    description: String,
    suite: String,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    select: Vec<String>,
    name: Expression,
    classname: Option<Expression>,
    time: Option<Expression>,
    time_scale: f64,
    status: Vec<Condition>,
    default_status: CaseStatus,
    message: Option<Expression>,
    detail: Option<Expression>,
}

#[derive(Debug, Clone)]
struct Condition {
    when: Expression,
    equals: Option<String>,
    status: CaseStatus,
}

impl Stylesheet {
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawStylesheet = toml::from_str(content).context("Failed to parse rule set")?;
        if raw.rules.is_empty() {
            bail!("rule set '{}' has no rules", raw.name);
        }

        let rules = raw
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                Rule::compile(rule).with_context(|| format!("rule #{} of '{}'", index + 1, raw.name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            suite: raw.suite.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            description: raw.description,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Stream `input` through the rules, writing canonical XML to `output`.
    ///
    /// Returns the number of testcases written. A document without any
    /// element (prolog or whitespace only) produces no output at all; text
    /// outside the root element fails.
    pub fn apply<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<usize> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        let mut writer = Writer::new_with_indent(output, b' ', 2);

        let mut buf = Vec::new();
        let mut ancestors: Vec<Node> = Vec::new();
        let mut capture: Option<(usize, Vec<Node>)> = None;
        let mut started = false;
        let mut cases = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .with_context(|| format!("invalid XML at byte {}", reader.buffer_position()))?
                .into_owned();
            buf.clear();

            match event {
                Event::Start(element) => {
                    if !started {
                        self.write_header(&mut writer)?;
                        started = true;
                    }
                    self.open_element(&element, &mut ancestors, &mut capture)?;
                }
                Event::Empty(element) => {
                    if !started {
                        self.write_header(&mut writer)?;
                        started = true;
                    }
                    self.open_element(&element, &mut ancestors, &mut capture)?;
                    self.close_element(&mut writer, &mut ancestors, &mut capture, &mut cases)?;
                }
                Event::End(_) => {
                    self.close_element(&mut writer, &mut ancestors, &mut capture, &mut cases)?;
                }
                Event::Text(text) if ancestors.is_empty() && capture.is_none() => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        let stray = String::from_utf8_lossy(&text);
                        bail!(
                            "not an XML document: unexpected text '{}'",
                            stray.trim().chars().take(40).collect::<String>()
                        );
                    }
                }
                Event::CData(_) if ancestors.is_empty() && capture.is_none() => {
                    bail!("not an XML document: unexpected CDATA outside the root element");
                }
                Event::Text(text) => {
                    if let Some(node) = capture.as_mut().and_then(|(_, stack)| stack.last_mut()) {
                        node.push_text(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = capture.as_mut().and_then(|(_, stack)| stack.last_mut()) {
                        let bytes = data.into_inner();
                        node.push_text(std::str::from_utf8(&bytes).context("invalid UTF-8 in CDATA")?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if capture.is_some() || !ancestors.is_empty() {
            bail!("unexpected end of document");
        }
        if started {
            writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
            writer.write_event(Event::End(BytesEnd::new("testsuites")))?;
        }
        writer.get_mut().flush()?;
        Ok(cases)
    }

    fn write_header<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("testsuites")))?;
        let mut suite = BytesStart::new("testsuite");
        suite.push_attribute(("name", self.suite.as_str()));
        writer.write_event(Event::Start(suite))?;
        Ok(())
    }

    fn matching_rule(&self, ancestors: &[Node], name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.selects(ancestors, name))
    }

    fn open_element(
        &self,
        element: &BytesStart<'_>,
        ancestors: &mut Vec<Node>,
        capture: &mut Option<(usize, Vec<Node>)>,
    ) -> Result<()> {
        let node = Node::from_start(element)?;
        if let Some((_, stack)) = capture.as_mut() {
            stack.push(node);
            return Ok(());
        }
        match self.matching_rule(ancestors, &node.name) {
            Some(index) => *capture = Some((index, vec![node])),
            None => ancestors.push(node),
        }
        Ok(())
    }

    fn close_element<W: Write>(
        &self,
        writer: &mut Writer<W>,
        ancestors: &mut Vec<Node>,
        capture: &mut Option<(usize, Vec<Node>)>,
        cases: &mut usize,
    ) -> Result<()> {
        let Some((index, stack)) = capture.as_mut() else {
            ancestors.pop();
            return Ok(());
        };
        let node = stack.pop().ok_or_else(|| anyhow!("unbalanced element nesting"))?;
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }

        let rule = &self.rules[*index];
        let scope = Scope {
            node: &node,
            ancestors: ancestors.as_slice(),
        };
        rule.write_case(writer, &scope)
            .with_context(|| format!("cannot transform <{}>", node.name))?;
        *cases += 1;
        *capture = None;
        Ok(())
    }
}

impl Rule {
    fn compile(raw: RawRule) -> Result<Self> {
        let select: Vec<String> = raw
            .select
            .split('/')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        if select.is_empty() {
            bail!("'select' must name at least one element");
        }
        if !raw.time_scale.is_finite() || raw.time_scale <= 0.0 {
            bail!("'time_scale' must be a positive number");
        }

        let optional = |value: Option<String>| value.as_deref().map(Expression::parse).transpose();
        Ok(Self {
            select,
            name: Expression::parse(&raw.name)?,
            classname: optional(raw.classname)?,
            time: optional(raw.time)?,
            time_scale: raw.time_scale,
            status: raw
                .status
                .into_iter()
                .map(|condition| -> Result<Condition> {
                    Ok(Condition {
                        when: Expression::parse(&condition.when)?,
                        equals: condition.equals,
                        status: condition.status,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            default_status: raw.default_status,
            message: optional(raw.message)?,
            detail: optional(raw.detail)?,
        })
    }

    /// `select` is a suffix of the open element path.
    fn selects(&self, ancestors: &[Node], name: &str) -> bool {
        let Some((last, parents)) = self.select.split_last() else {
            return false;
        };
        if last != name || parents.len() > ancestors.len() {
            return false;
        }
        let tail = &ancestors[ancestors.len() - parents.len()..];
        tail.iter().zip(parents).all(|(node, expected)| &node.name == expected)
    }

    fn write_case<W: Write>(&self, writer: &mut Writer<W>, scope: &Scope<'_>) -> Result<()> {
        let name = self.name.value(scope).unwrap_or_default();
        let classname = self.classname.as_ref().and_then(|e| e.value(scope));
        let time = match self.time.as_ref().and_then(|e| e.value(scope)) {
            Some(raw) => {
                let value: f64 = raw
                    .replace(',', "")
                    .parse()
                    .map_err(|_| anyhow!("time value '{}' is not a number", raw))?;
                Some(format!("{:.3}", value * self.time_scale))
            }
            None => None,
        };
        let status = self
            .status
            .iter()
            .find(|condition| condition.matches(scope))
            .map_or(self.default_status, |condition| condition.status);

        let mut start = BytesStart::new("testcase");
        start.push_attribute(("name", name.as_str()));
        if let Some(classname) = &classname {
            start.push_attribute(("classname", classname.as_str()));
        }
        if let Some(time) = &time {
            start.push_attribute(("time", time.as_str()));
        }

        let Some(element) = status.element() else {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        };

        writer.write_event(Event::Start(start))?;
        let mut child = BytesStart::new(element);
        if let Some(message) = self.message.as_ref().and_then(|e| e.value(scope)) {
            child.push_attribute(("message", message.as_str()));
        }
        match self.detail.as_ref().and_then(|e| e.value(scope)) {
            Some(detail) => {
                writer.write_event(Event::Start(child))?;
                writer.write_event(Event::Text(BytesText::new(&detail)))?;
                writer.write_event(Event::End(BytesEnd::new(element)))?;
            }
            None => writer.write_event(Event::Empty(child))?,
        }
        writer.write_event(Event::End(BytesEnd::new("testcase")))?;
        Ok(())
    }
}

impl Condition {
    fn matches(&self, scope: &Scope<'_>) -> bool {
        match &self.equals {
            Some(expected) => self.when.value(scope).as_deref() == Some(expected.as_str()),
            None => self.when.exists(scope),
        }
    }
}

/// Captured element: attributes, direct text and child elements.
#[derive(Debug, Clone, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn from_start(element: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            attributes.push((key, attr.unescape_value()?.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(element.local_name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(text);
    }
}

/// Evaluation context: the selected element and its open ancestors.
struct Scope<'a> {
    node: &'a Node,
    ancestors: &'a [Node],
}

#[derive(Debug, Clone, PartialEq)]
struct Expression {
    alternatives: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Literal(String),
    Path(PathExpr),
}

#[derive(Debug, Clone, PartialEq)]
struct PathExpr {
    parents: usize,
    steps: Vec<Step>,
    target: Target,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    name: String,
    predicate: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Text,
    Attribute(String),
}

impl Expression {
    fn parse(source: &str) -> Result<Self> {
        let alternatives = split_unquoted(source, '|')
            .into_iter()
            .map(|term| Term::parse(term.trim()).with_context(|| format!("invalid expression '{}'", source)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { alternatives })
    }

    /// First alternative that yields a non-empty value.
    fn value(&self, scope: &Scope<'_>) -> Option<String> {
        self.alternatives
            .iter()
            .filter_map(|term| term.value(scope))
            .find(|value| !value.is_empty())
    }

    fn exists(&self, scope: &Scope<'_>) -> bool {
        self.alternatives.iter().any(|term| term.value(scope).is_some())
    }
}

impl Term {
    fn parse(term: &str) -> Result<Self> {
        if term.is_empty() {
            bail!("empty alternative");
        }
        if let Some(literal) = unquote(term) {
            return Ok(Term::Literal(literal.to_string()));
        }

        let mut segments = split_unquoted(term, '/');
        let target = match segments.last().and_then(|last| last.trim().strip_prefix('@')) {
            Some(attribute) => {
                let attribute = attribute.to_string();
                segments.pop();
                Target::Attribute(attribute)
            }
            None => Target::Text,
        };

        let mut parents = 0;
        let mut steps = Vec::new();
        for segment in segments.into_iter().map(str::trim) {
            match segment {
                "." => {}
                ".." if steps.is_empty() => parents += 1,
                ".." => bail!("'..' is only allowed at the start of a path"),
                "" => bail!("empty path step"),
                step => steps.push(Step::parse(step)?),
            }
        }
        Ok(Term::Path(PathExpr {
            parents,
            steps,
            target,
        }))
    }

    fn value(&self, scope: &Scope<'_>) -> Option<String> {
        match self {
            Term::Literal(literal) => Some(literal.clone()),
            Term::Path(path) => path.value(scope),
        }
    }
}

impl Step {
    fn parse(segment: &str) -> Result<Self> {
        let Some(open) = segment.find('[') else {
            return Ok(Self {
                name: segment.to_string(),
                predicate: None,
            });
        };
        let inner = segment[open + 1..]
            .strip_suffix(']')
            .ok_or_else(|| anyhow!("unterminated predicate in '{}'", segment))?;
        let (attribute, value) = inner
            .split_once('=')
            .ok_or_else(|| anyhow!("predicate must be [@attr='value'] in '{}'", segment))?;
        let attribute = attribute
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("predicate must test an attribute in '{}'", segment))?;
        let value = unquote(value.trim()).ok_or_else(|| anyhow!("predicate value must be quoted in '{}'", segment))?;
        Ok(Self {
            name: segment[..open].trim().to_string(),
            predicate: Some((attribute.to_string(), value.to_string())),
        })
    }

    fn matches(&self, node: &Node) -> bool {
        node.name == self.name
            && self
                .predicate
                .as_ref()
                .is_none_or(|(key, value)| node.attribute(key) == Some(value.as_str()))
    }
}

impl PathExpr {
    /// `None` when nothing is selected; `Some("")` for a selected empty element.
    fn value(&self, scope: &Scope<'_>) -> Option<String> {
        let start = if self.parents == 0 {
            scope.node
        } else {
            let index = scope.ancestors.len().checked_sub(self.parents)?;
            &scope.ancestors[index]
        };

        let mut candidates = vec![start];
        for step in &self.steps {
            candidates = candidates
                .into_iter()
                .flat_map(|node| node.children.iter())
                .filter(|child| step.matches(child))
                .collect();
        }

        match &self.target {
            Target::Text => candidates.first().map(|node| node.text.trim().to_string()),
            Target::Attribute(key) => candidates
                .iter()
                .find_map(|node| node.attribute(key))
                .map(|value| value.trim().to_string()),
        }
    }
}

fn unquote(term: &str) -> Option<&str> {
    term.strip_prefix('\'')?.strip_suffix('\'')
}

fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, c) in input.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        } else if c == separator && !quoted {
            parts.push(&input[start..index]);
            start = index + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
name = "sample"
description = "Sample dialect"
suite = "sample-suite"

[[rules]]
select = "Run/Case"
name = "@id"
classname = "../@name|'default'"
time = "Duration"
time_scale = 0.001
message = "Outcome/Message"
detail = "Outcome/Trace"

[[rules.status]]
when = "Outcome/@kind"
equals = "crash"
status = "error"

[[rules.status]]
when = "Outcome"
status = "failure"

[[rules.status]]
when = "@ignored"
equals = "true"
status = "skipped"
"#;

    fn transform(rules: &str, input: &str) -> (usize, String) {
        let stylesheet = Stylesheet::from_toml(rules).unwrap();
        let mut output = Vec::new();
        let cases = stylesheet.apply(input.as_bytes(), &mut output).unwrap();
        (cases, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_expression_parsing() {
        let expr = Expression::parse("Results/Measurement[@name='Exit Code']/Value|'none'").unwrap();
        assert_eq!(expr.alternatives.len(), 2);
        assert_eq!(expr.alternatives[1], Term::Literal("none".to_string()));
        let Term::Path(path) = &expr.alternatives[0] else {
            panic!("expected a path");
        };
        assert_eq!(path.steps.len(), 3);
        assert_eq!(
            path.steps[1].predicate,
            Some(("name".to_string(), "Exit Code".to_string()))
        );
        assert_eq!(path.target, Target::Text);

        let Term::Path(parent) = &Expression::parse("../@name").unwrap().alternatives[0] else {
            panic!("expected a path");
        };
        assert_eq!(parent.parents, 1);
        assert_eq!(parent.target, Target::Attribute("name".to_string()));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(Expression::parse("A[@x='1'").is_err());
        assert!(Expression::parse("A[x='1']").is_err());
        assert!(Expression::parse("A//B").is_err());
        assert!(Expression::parse("A/../B").is_err());
    }

    #[test]
    fn test_apply_rules() {
        let input = r#"<?xml version="1.0"?>
<Log>
  <Run name="core">
    <Case id="ok"><Duration>12</Duration></Case>
    <Case id="bad"><Duration>1,500</Duration><Outcome><Message>boom &amp; bust</Message><Trace>at a.cpp:3</Trace></Outcome></Case>
    <Case id="crash"><Outcome kind="crash"/></Case>
    <Case id="off" ignored="true"/>
  </Run>
  <Case id="not-selected"/>
</Log>"#;
        let (cases, output) = transform(RULES, input);
        assert_eq!(cases, 4);
        assert!(output.contains(r#"<testsuite name="sample-suite">"#));
        assert!(output.contains(r#"<testcase name="ok" classname="core" time="0.012"/>"#));
        assert!(output.contains(r#"<testcase name="bad" classname="core" time="1.500">"#));
        assert!(output.contains(r#"<failure message="boom &amp; bust">at a.cpp:3</failure>"#));
        assert!(output.contains(r#"<error/>"#));
        assert!(output.contains(r#"<skipped/>"#));
        assert!(!output.contains("not-selected"));
    }

    #[test]
    fn test_output_parses_as_canonical_report() {
        use crate::xunit::{TestBatchStatistics, TestCaseReader};
        use std::path::Path;

        let input = r#"<Log><Run name="r"><Case id="a"><Duration>10</Duration></Case><Case id="b" ignored="true"><Duration>3</Duration></Case></Run></Log>"#;
        let (_, output) = transform(RULES, input);
        let records: Vec<_> = TestCaseReader::new(output.as_bytes(), Path::new("t.xml"))
            .unwrap()
            .collect::<crate::error::Result<_>>()
            .unwrap();
        let stats = TestBatchStatistics::aggregate(&records);
        assert_eq!(stats.tests, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.time_ms, 13);
    }

    #[test]
    fn test_document_without_elements_produces_nothing() {
        let (cases, output) = transform(RULES, "<?xml version=\"1.0\"?>\n");
        assert_eq!(cases, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_malformed_input_fails() {
        let stylesheet = Stylesheet::from_toml(RULES).unwrap();
        let mut output = Vec::new();
        assert!(stylesheet.apply("<Log><Run>".as_bytes(), &mut output).is_err());
        assert!(stylesheet.apply("<Log></Run>".as_bytes(), &mut output).is_err());
    }

    #[test]
    fn test_text_outside_root_fails() {
        let stylesheet = Stylesheet::from_toml(RULES).unwrap();
        for input in ["not xml", "{\"json\": true}", "<Run><Case id='a'/></Run> trailing"] {
            let mut output = Vec::new();
            let err = stylesheet.apply(input.as_bytes(), &mut output).unwrap_err();
            assert!(err.to_string().contains("not an XML document"), "{}", input);
        }
    }

    #[test]
    fn test_non_numeric_time_fails() {
        let stylesheet = Stylesheet::from_toml(RULES).unwrap();
        let mut output = Vec::new();
        let input = "<Run><Case id='x'><Duration>soon</Duration></Case></Run>";
        assert!(stylesheet.apply(input.as_bytes(), &mut output).is_err());
    }

    #[test]
    fn test_invalid_rule_sets() {
        assert!(Stylesheet::from_toml("name = \"x\"\nrules = []").is_err());
        assert!(Stylesheet::from_toml("name = \"x\"\n[[rules]]\nselect = \"\"\nname = \"@n\"").is_err());
        assert!(Stylesheet::from_toml("name = \"x\"\n[[rules]]\nselect = \"T\"\nname = \"@n\"\ntime_scale = 0").is_err());
        assert!(Stylesheet::from_toml("name = \"x\"\n[[rules]]\nselect = \"T\"\nname = \"@n\"\nbogus = 1").is_err());
    }
}
