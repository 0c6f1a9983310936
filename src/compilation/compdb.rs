use super::{CompilationSettings, parse_arguments, resolve, split_command_line};
use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One entry of a `compile_commands.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    /// `arguments` wins over `command` when both are present.
    pub fn argv(&self) -> Option<Vec<String>> {
        match (&self.arguments, &self.command) {
            (Some(arguments), _) => Some(arguments.clone()),
            (None, Some(command)) => Some(split_command_line(command)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    entries: Vec<CompileCommand>,
}

impl CompilationDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ReportError::io(e, path))?;
        let entries: Vec<CompileCommand> =
            serde_json::from_str(&content).map_err(|e| ReportError::malformed(path, e.to_string()))?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CompileCommand] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn settings(&self) -> CompilationSettings {
        let mut settings = CompilationSettings::default();
        for entry in &self.entries {
            let Some(argv) = entry.argv() else {
                tracing::warn!(
                    "Compilation database entry for '{}' has neither 'command' nor 'arguments', ignoring",
                    entry.file
                );
                continue;
            };
            settings.add(
                resolve(&entry.directory, &entry.file),
                parse_arguments(&argv, &entry.directory),
            );
        }
        settings
    }
}
