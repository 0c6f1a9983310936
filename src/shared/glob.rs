//! Glob pattern utilities
//!
//! Report path patterns are Ant-style: `*` stays inside one directory, `**`
//! crosses directories. Literal paths are passed through untouched.

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Check if a string contains glob pattern characters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Compile a pattern so that `*` does not match the path separator
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
    Ok(glob.compile_matcher())
}

/// Leading components of a pattern that contain no glob characters
fn static_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in Path::new(pattern).components() {
        match component {
            Component::Normal(part) if is_glob_pattern(&part.to_string_lossy()) => break,
            other => prefix.push(other.as_os_str()),
        }
    }
    // The last static component may itself be the file part of the pattern
    if prefix == Path::new(pattern) {
        prefix.pop();
    }
    prefix
}

/// Expand a single glob pattern to matching file paths, sorted by path
pub fn expand_glob_pattern<P: AsRef<Path>>(pattern: &str, base_dir: P) -> Result<Vec<PathBuf>> {
    let base_dir = base_dir.as_ref();
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let matcher = compile_pattern(pattern)?;
    let absolute = Path::new(pattern).is_absolute();
    let walk_root = base_dir.join(static_prefix(pattern));

    let mut matching_paths = Vec::new();
    if !walk_root.is_dir() {
        return Ok(matching_paths);
    }

    for entry in WalkDir::new(&walk_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let candidate = if absolute {
            Some(path)
        } else {
            path.strip_prefix(base_dir).ok()
        };
        if candidate.is_some_and(|p| matcher.is_match(p)) {
            matching_paths.push(path.to_path_buf());
        }
    }

    Ok(matching_paths)
}

/// Expand a list of patterns (literal paths or globs) into existing files.
///
/// Order follows the pattern list; the first occurrence of a file wins.
pub fn expand_file_patterns<P: AsRef<Path>>(patterns: &[String], base_dir: P) -> Result<Vec<PathBuf>> {
    let base_dir = base_dir.as_ref();
    let mut valid_paths: Vec<PathBuf> = Vec::new();

    for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let found = if is_glob_pattern(pattern) {
            expand_glob_pattern(pattern, base_dir)?
        } else {
            let path = base_dir.join(pattern);
            if path.is_file() {
                vec![path]
            } else {
                tracing::warn!("Report '{}' does not exist, ignoring", path.display());
                Vec::new()
            }
        };

        for path in found {
            if !valid_paths.contains(&path) {
                valid_paths.push(path);
            }
        }
    }

    Ok(valid_paths)
}
