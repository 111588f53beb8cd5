//! Configuration loading from disk and from request bodies.
//!
//! Loading only decodes. Admission (defaults + validation) runs on every
//! install path, see `lifecycle::reload`.

use std::fs;
use std::path::Path;

use crate::config::schema::Config;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("config file does not exist: {0}")]
    NotFound(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported config file format: {0:?} (expected .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(String),

    #[error("failed to unmarshal config from json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to unmarshal config from yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to unmarshal config from toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config body is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Serialization formats a `Config` can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match ext {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Pick a format from a `Content-Type` value. Anything unrecognized is
    /// treated as YAML, which also accepts JSON documents.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase());
        match essence.as_deref() {
            Some("application/json") => ConfigFormat::Json,
            Some("application/toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }

    /// Decode a configuration document.
    pub fn parse(&self, bytes: &[u8]) -> Result<Config, LoadError> {
        let config = match self {
            ConfigFormat::Json => serde_json::from_slice(bytes)?,
            ConfigFormat::Yaml => serde_yaml::from_slice(bytes)?,
            ConfigFormat::Toml => toml::from_str(std::str::from_utf8(bytes)?)?,
        };
        Ok(config)
    }
}

/// Load a configuration file, choosing the decoder by extension.
pub fn load_config(path: &Path) -> Result<Config, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read(path)?;
    format.parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_each_supported_extension() {
        let yaml = write_temp(".yaml", "app:\n  name: from-yaml\n  listeners: [8080]\n");
        let yml = write_temp(".yml", "app:\n  name: from-yml\n");
        let json = write_temp(".json", r#"{"app":{"name":"from-json"}}"#);
        let toml = write_temp(".toml", "[app]\nname = \"from-toml\"\nlisteners = [9000]\n");

        assert_eq!(load_config(yaml.path()).unwrap().app.name, "from-yaml");
        assert_eq!(load_config(yml.path()).unwrap().app.name, "from-yml");
        assert_eq!(load_config(json.path()).unwrap().app.name, "from-json");
        let from_toml = load_config(toml.path()).unwrap();
        assert_eq!(from_toml.app.name, "from-toml");
        assert_eq!(from_toml.app.listeners, vec![9000]);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".ini", "app = 1");
        assert!(matches!(
            load_config(file.path()),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let file = write_temp(".json", "{ not json");
        assert!(matches!(load_config(file.path()), Err(LoadError::Json(_))));
    }

    #[test]
    fn content_type_selects_decoder() {
        assert_eq!(
            ConfigFormat::from_content_type(Some("application/json; charset=utf-8")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_content_type(Some("application/toml")),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_content_type(Some("text/plain")),
            ConfigFormat::Yaml
        );
        assert_eq!(ConfigFormat::from_content_type(None), ConfigFormat::Yaml);
    }

    #[test]
    fn yaml_decoder_accepts_json_bodies() {
        let config = ConfigFormat::Yaml
            .parse(br#"{"app":{"name":"json-as-yaml","listeners":[8080]}}"#)
            .unwrap();
        assert_eq!(config.app.name, "json-as-yaml");
    }
}
