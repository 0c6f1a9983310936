use figment::providers::{Data, Format, Json, Toml, Yaml};
use figment::value::{Dict, Map};
use figment::{Error, Metadata, Profile, Provider};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

/// Provider for a config file whose format follows its extension, falling
/// back to sniffing the content. Undetectable files are read as TOML.
pub fn auto<P: AsRef<Path>>(path: P) -> impl Provider {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let format = match extension.as_str() {
        "toml" => ConfigFormat::Toml,
        "json" => ConfigFormat::Json,
        "yaml" | "yml" => ConfigFormat::Yaml,
        _ => match std::fs::read_to_string(path) {
            Ok(content) => detect_format(&content).unwrap_or_else(|| {
                tracing::debug!("Could not detect format of '{}', reading it as TOML", path.display());
                ConfigFormat::Toml
            }),
            Err(err) => {
                tracing::debug!("Could not read '{}': {}", path.display(), err);
                ConfigFormat::Toml
            }
        },
    };
    tracing::debug!("Loading '{}' as {:?}", path.display(), format);

    match format {
        ConfigFormat::Toml => SmartProvider::Toml(Toml::file(path)),
        ConfigFormat::Json => SmartProvider::Json(Json::file(path)),
        ConfigFormat::Yaml => SmartProvider::Yaml(Yaml::file(path)),
    }
}

enum SmartProvider {
    Toml(Data<Toml>),
    Json(Data<Json>),
    Yaml(Data<Yaml>),
}

impl Provider for SmartProvider {
    fn metadata(&self) -> Metadata {
        match self {
            SmartProvider::Toml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Yaml(p) => p.metadata(),
        }
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        match self {
            SmartProvider::Toml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Yaml(p) => p.data(),
        }
    }
}

fn detect_format(content: &str) -> Option<ConfigFormat> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(ConfigFormat::Json);
    }

    // TOML before YAML: `key = "a:b"` would otherwise look like YAML
    let is_toml_line = |line: &str| {
        (line.starts_with('[') && line.ends_with(']'))
            || line.split_once('=').is_some_and(|(key, _)| !key.contains(':'))
    };
    if trimmed.lines().map(str::trim).any(is_toml_line) {
        return Some(ConfigFormat::Toml);
    }

    if trimmed.starts_with("---")
        || trimmed
            .lines()
            .map(str::trim)
            .any(|line| line.contains(':') && !line.starts_with('#'))
    {
        return Some(ConfigFormat::Yaml);
    }

    None
}
