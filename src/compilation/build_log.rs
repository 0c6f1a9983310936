use super::{CompilationSettings, is_cl, parse_arguments, resolve, split_command_line};
use crate::error::{ReportError, Result};
use crate::report::Report;
use regex::Regex;
use std::io::BufRead;
use std::path::{Path, PathBuf};

struct LogPatterns {
    project: Regex,
    source: Regex,
}

impl LogPatterns {
    fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            project: Regex::new(r#"^\s*(?:\d+>)?Project "(?P<project>[^"]+)""#)?,
            source: Regex::new(r"(?i)\.(c|cc|cpp|cxx|c\+\+)$")?,
        })
    }
}

/// Compiler invocations found in an MSBuild detailed build log.
#[derive(Debug, Default)]
pub struct BuildLog {
    settings: CompilationSettings,
    invocations: usize,
}

impl BuildLog {
    pub fn parse(report: &Report) -> Result<Self> {
        let patterns = LogPatterns::new().map_err(|e| ReportError::Config(e.to_string()))?;
        let reader = report.reader()?;
        let mut log = Self::default();
        let mut directory = report
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        for line in reader.lines() {
            let line = line.map_err(|e| ReportError::malformed(report.path(), e.to_string()))?;
            if let Some(captures) = patterns.project.captures(&line) {
                if let Some(parent) = windows_parent(&captures["project"]) {
                    directory = parent;
                }
                continue;
            }
            log.add_line(&line, &directory, &patterns.source);
        }
        Ok(log)
    }

    fn add_line(&mut self, line: &str, directory: &Path, source_file: &Regex) {
        let mut arguments = split_command_line(line.trim());
        // MSBuild prefixes lines with the node id, e.g. "1>"
        if let Some(first) = arguments.first_mut() {
            if let Some((node, tool)) = first.split_once('>') {
                if node.chars().all(|c| c.is_ascii_digit()) {
                    *first = tool.to_string();
                }
            }
        }
        if !arguments.first().is_some_and(|tool| is_cl(tool)) {
            return;
        }

        let settings = parse_arguments(&arguments, directory);
        let sources: Vec<&String> = arguments
            .iter()
            .skip(1)
            .filter(|arg| !arg.starts_with('/') && !arg.starts_with('-') && source_file.is_match(arg))
            .collect();
        if sources.is_empty() {
            return;
        }

        self.invocations += 1;
        for source in sources {
            self.settings.add(resolve(directory, source), settings.clone());
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn settings(&self) -> &CompilationSettings {
        &self.settings
    }

    pub fn into_settings(self) -> CompilationSettings {
        self.settings
    }
}

/// Parent directory of a project path in either separator style.
fn windows_parent(project: &str) -> Option<PathBuf> {
    let cut = project.rfind(['\\', '/'])?;
    Some(PathBuf::from(&project[..cut]))
}
