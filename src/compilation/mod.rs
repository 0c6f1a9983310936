//! Preprocessor settings for the external analyzer
//!
//! Defines, include directories and forced includes are collected per source
//! file from a JSON compilation database and from MSBuild build logs.

mod build_log;
mod compdb;

pub use build_log::BuildLog;
pub use compdb::{CompilationDatabase, CompileCommand};

use crate::error::Result;
use crate::recovery::{Outcome, RecoveryPolicy};
use crate::report::Report;
use encoding_rs::Encoding;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSettings {
    pub defines: BTreeMap<String, String>,
    pub include_dirs: Vec<PathBuf>,
    pub forced_includes: Vec<PathBuf>,
}

impl SourceSettings {
    /// Later defines win; paths keep their first position.
    pub fn merge(&mut self, other: SourceSettings) {
        self.defines.extend(other.defines);
        for dir in other.include_dirs {
            if !self.include_dirs.contains(&dir) {
                self.include_dirs.push(dir);
            }
        }
        for include in other.forced_includes {
            if !self.forced_includes.contains(&include) {
                self.forced_includes.push(include);
            }
        }
    }
}

/// Settings of every known source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompilationSettings {
    files: BTreeMap<PathBuf, SourceSettings>,
}

impl CompilationSettings {
    pub fn add(&mut self, file: PathBuf, settings: SourceSettings) {
        self.files.entry(file).or_default().merge(settings);
    }

    pub fn merge(&mut self, other: CompilationSettings) {
        for (file, settings) in other.files {
            self.add(file, settings);
        }
    }

    pub fn get(&self, file: &Path) -> Option<&SourceSettings> {
        self.files.get(file)
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &SourceSettings)> {
        self.files.iter().map(|(path, settings)| (path.as_path(), settings))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Merge a compilation database and any number of build logs.
    pub fn collect(
        database: Option<&Path>,
        build_logs: &[PathBuf],
        encoding: &'static Encoding,
        policy: RecoveryPolicy,
    ) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(path) = database {
            let loaded = CompilationDatabase::load(path);
            if let Err(err) = &loaded {
                tracing::error!("Cannot read compilation database '{}': {}", path.display(), err);
            }
            if let Outcome::Completed(database) = policy.handle(loaded)? {
                tracing::info!("Read {} entries from '{}'", database.len(), path.display());
                settings.merge(database.settings());
            }
        }

        for path in build_logs {
            tracing::info!("Processing build log '{}'", path.display());
            let parsed = Report::open(path, encoding).and_then(|report| BuildLog::parse(&report));
            if let Err(err) = &parsed {
                tracing::error!("Cannot read build log '{}': {}", path.display(), err);
            }
            if let Outcome::Completed(log) = policy.handle(parsed)? {
                tracing::debug!("Found {} compiler invocations", log.invocations());
                settings.merge(log.into_settings());
            }
        }

        Ok(settings)
    }
}

/// Extract settings from one compiler invocation.
///
/// `/D`, `/I` and `/FI` switches are only recognized for cl-style compilers.
pub fn parse_arguments(arguments: &[String], directory: &Path) -> SourceSettings {
    let msvc = arguments.first().is_some_and(|tool| is_cl(tool));
    let mut settings = SourceSettings::default();
    let mut args = arguments.iter().skip(1);

    while let Some(arg) = args.next() {
        let (kind, value) = if let Some(rest) = switch(arg, msvc, "D") {
            (Switch::Define, rest)
        } else if let Some(rest) = arg.strip_prefix("-include").or_else(|| switch_msvc(arg, msvc, "FI")) {
            (Switch::ForcedInclude, rest)
        } else if let Some(rest) = switch(arg, msvc, "I") {
            (Switch::Include, rest)
        } else {
            continue;
        };

        let value = if value.is_empty() {
            match args.next() {
                Some(next) => next.as_str(),
                None => break,
            }
        } else {
            value
        };

        match kind {
            Switch::Define => {
                let (name, definition) = value.split_once('=').unwrap_or((value, "1"));
                settings.defines.insert(name.to_string(), definition.to_string());
            }
            Switch::Include => settings.include_dirs.push(resolve(directory, value)),
            Switch::ForcedInclude => settings.forced_includes.push(resolve(directory, value)),
        }
    }
    settings
}

enum Switch {
    Define,
    Include,
    ForcedInclude,
}

fn switch<'a>(arg: &'a str, msvc: bool, name: &str) -> Option<&'a str> {
    arg.strip_prefix('-')
        .and_then(|rest| rest.strip_prefix(name))
        .or_else(|| switch_msvc(arg, msvc, name))
}

fn switch_msvc<'a>(arg: &'a str, msvc: bool, name: &str) -> Option<&'a str> {
    if !msvc {
        return None;
    }
    arg.strip_prefix('/').and_then(|rest| rest.strip_prefix(name))
}

/// `cl`, `cl.exe` or a path to either, any case.
pub fn is_cl(tool: &str) -> bool {
    let name = tool.rsplit(['/', '\\']).next().unwrap_or(tool).to_ascii_lowercase();
    name == "cl" || name == "cl.exe"
}

/// Resolve a possibly relative path; Windows drive paths are kept as-is.
pub fn resolve(directory: &Path, path: &str) -> PathBuf {
    let bytes = path.as_bytes();
    let has_drive = bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if has_drive || Path::new(path).is_absolute() || path.starts_with('\\') {
        PathBuf::from(path)
    } else {
        directory.join(path)
    }
}

/// Split a command line into arguments, honoring double quotes.
///
/// Backslashes are literal except before a quote (MSVC runtime rules), so
/// Windows paths survive.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_argument = false;
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut count = 1;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    count += 1;
                }
                if chars.peek() == Some(&'"') {
                    // 2n backslashes + quote: n backslashes, the quote delimits
                    current.extend(std::iter::repeat_n('\\', count / 2));
                    if count % 2 == 1 {
                        current.push('"');
                        chars.next();
                    }
                } else {
                    current.extend(std::iter::repeat_n('\\', count));
                }
                in_argument = true;
            }
            '"' => {
                quoted = !quoted;
                in_argument = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_argument {
                    arguments.push(std::mem::take(&mut current));
                    in_argument = false;
                }
            }
            c => {
                current.push(c);
                in_argument = true;
            }
        }
    }
    if in_argument {
        arguments.push(current);
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        split_command_line(line)
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            args(r#"cl.exe /c /I"C:\Program Files\include" /D "NAME=a b"  main.cpp"#),
            vec!["cl.exe", "/c", r"/IC:\Program Files\include", "/D", "NAME=a b", "main.cpp"]
        );
        assert_eq!(args(r#"gcc -DMSG=\"hi\" a.c"#), vec!["gcc", r#"-DMSG="hi""#, "a.c"]);
        assert_eq!(args(r#"a "" b"#), vec!["a", "", "b"]);
        assert_eq!(args(r#"/Fo"Debug\\" x.cpp"#), vec![r"/FoDebug\", "x.cpp"]);
        assert!(args("   ").is_empty());
    }

    #[test]
    fn test_gcc_style_arguments() {
        let settings = parse_arguments(
            &args("g++ -DDEBUG -D VERSION=2 -Iinclude -I /usr/include -include config.h -c a.cpp"),
            Path::new("/work"),
        );
        assert_eq!(settings.defines.get("DEBUG").map(String::as_str), Some("1"));
        assert_eq!(settings.defines.get("VERSION").map(String::as_str), Some("2"));
        assert_eq!(
            settings.include_dirs,
            vec![PathBuf::from("/work/include"), PathBuf::from("/usr/include")]
        );
        assert_eq!(settings.forced_includes, vec![PathBuf::from("/work/config.h")]);
    }

    #[test]
    fn test_msvc_switches_only_for_cl() {
        let settings = parse_arguments(&args("CL.exe /DWIN32 /D _DEBUG /Iinc /FIpch.h a.cpp"), Path::new("/w"));
        assert_eq!(settings.defines.len(), 2);
        assert_eq!(settings.include_dirs, vec![PathBuf::from("/w/inc")]);
        assert_eq!(settings.forced_includes, vec![PathBuf::from("/w/pch.h")]);

        let settings = parse_arguments(&args("gcc /Dev/null.c"), Path::new("/w"));
        assert!(settings.defines.is_empty());
    }

    #[test]
    fn test_resolve_windows_paths() {
        assert_eq!(resolve(Path::new("/w"), r"C:\inc"), PathBuf::from(r"C:\inc"));
        assert_eq!(resolve(Path::new("/w"), "inc"), PathBuf::from("/w/inc"));
    }

    #[test]
    fn test_settings_merge() {
        let mut settings = CompilationSettings::default();
        let mut first = SourceSettings::default();
        first.defines.insert("A".to_string(), "1".to_string());
        first.include_dirs.push(PathBuf::from("/inc"));
        let mut second = SourceSettings::default();
        second.defines.insert("A".to_string(), "2".to_string());
        second.include_dirs.push(PathBuf::from("/inc"));
        second.include_dirs.push(PathBuf::from("/other"));

        settings.add(PathBuf::from("a.cpp"), first);
        settings.add(PathBuf::from("a.cpp"), second);
        let merged = settings.get(Path::new("a.cpp")).unwrap();
        assert_eq!(merged.defines["A"], "2");
        assert_eq!(merged.include_dirs.len(), 2);
        assert_eq!(settings.len(), 1);
    }
}
