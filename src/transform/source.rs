//! Resolution of transformation identifiers to rule sets

use super::Stylesheet;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Rule sets shipped with the binary.
const BUNDLED: [(&str, &str); 3] = [
    (
        "boosttest-1.x-to-junit-1.0",
        include_str!("builtin/boosttest-1.x-to-junit-1.0.toml"),
    ),
    (
        "cppunit-1.x-to-junit-1.0",
        include_str!("builtin/cppunit-1.x-to-junit-1.0.toml"),
    ),
    ("ctest-to-junit", include_str!("builtin/ctest-to-junit.toml")),
];

pub fn bundled_names() -> impl Iterator<Item = &'static str> {
    BUNDLED.iter().map(|(name, _)| *name)
}

/// Look up a bundled rule set; a trailing `.xsl` or `.toml` is ignored.
pub fn bundled(identifier: &str) -> Option<&'static str> {
    let name = identifier
        .strip_suffix(".xsl")
        .or_else(|| identifier.strip_suffix(".toml"))
        .unwrap_or(identifier);
    BUNDLED
        .iter()
        .find(|(bundled, _)| *bundled == name)
        .map(|(_, content)| *content)
}

/// Every bundled rule set, compiled.
pub fn bundled_stylesheets() -> Result<Vec<Stylesheet>> {
    BUNDLED
        .iter()
        .map(|(name, content)| {
            Stylesheet::from_toml(content).with_context(|| format!("bundled rule set '{}'", name))
        })
        .collect()
}

/// Resolve an identifier: bundled name first, then URL, then local file.
pub fn load(identifier: &str) -> Result<Stylesheet> {
    let content = match bundled(identifier) {
        Some(content) => {
            tracing::debug!("Using bundled transformation '{}'", identifier);
            content.to_string()
        }
        None if identifier.starts_with("http://") || identifier.starts_with("https://") => {
            fetch(identifier)?
        }
        None => {
            let path = Path::new(identifier.strip_prefix("file://").unwrap_or(identifier));
            if !path.is_file() {
                bail!(
                    "unknown transformation '{}': not a bundled rule set, URL or existing file",
                    identifier
                );
            }
            tracing::debug!("Reading transformation from '{}'", path.display());
            fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?
        }
    };

    Stylesheet::from_toml(&content).with_context(|| format!("invalid transformation '{}'", identifier))
}

fn fetch(url: &str) -> Result<String> {
    tracing::info!("Fetching transformation from '{}'", url);
    let response = ureq::get(url)
        .timeout(FETCH_TIMEOUT)
        .call()
        .with_context(|| format!("Failed to fetch '{}'", url))?;
    response
        .into_string()
        .with_context(|| format!("Failed to read response from '{}'", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_lookup_ignores_extension() {
        assert!(bundled("ctest-to-junit").is_some());
        assert!(bundled("boosttest-1.x-to-junit-1.0.xsl").is_some());
        assert!(bundled("cppunit-1.x-to-junit-1.0.toml").is_some());
        assert!(bundled("nunit").is_none());
    }

    #[test]
    fn test_bundled_rule_sets_compile() {
        let stylesheets = bundled_stylesheets().unwrap();
        let names: Vec<_> = stylesheets.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, bundled_names().collect::<Vec<_>>());
        assert!(stylesheets.iter().all(|s| !s.description().is_empty()));
    }

    #[test]
    fn test_load_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(
            &path,
            "name = \"custom\"\n[[rules]]\nselect = \"Case\"\nname = \"@id\"\n",
        )
        .unwrap();

        assert_eq!(load(&path.to_string_lossy()).unwrap().name(), "custom");
        let url = format!("file://{}", path.display());
        assert_eq!(load(&url).unwrap().name(), "custom");
    }

    #[test]
    fn test_unknown_identifier_fails() {
        let err = load("no-such-transformation").unwrap_err();
        assert!(err.to_string().contains("unknown transformation"));
    }
}
