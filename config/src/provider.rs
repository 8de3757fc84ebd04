//! # Configuration Providers
//!
//! Read-only sources for the base configuration chain.
//!
//! Providers are registered in order; later providers override earlier
//! ones when the chain is composed. The writable overlay is not a
//! provider; it is a separate tier owned by the settings manager.

use crate::value::set_path;
use errors::SettingsError;
use serde_json::{Map, Value};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A read-only configuration source producing a JSON tree.
pub trait ConfigProvider: Send + Sync {
    /// Identifier used in logs and load errors.
    fn name(&self) -> String;

    /// Produce this provider's configuration tree.
    fn load(&self) -> Result<Value, SettingsError>;

    /// Backing file path, for file-based providers.
    fn file_path(&self) -> Option<&Path> {
        None
    }
}

/// Supported on-disk formats for file providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Yaml,
}

/// File-based configuration provider.
///
/// Format is detected from the extension unless given explicitly. A
/// required provider fails to load when its file is missing; an
/// optional one yields an empty tree instead.
pub struct FileProvider {
    path: PathBuf,
    format: FileFormat,
    required: bool,
}

impl FileProvider {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path)?;

        Ok(Self {
            path,
            format,
            required: true,
        })
    }

    /// Create with an explicit format instead of extension detection.
    pub fn with_format(path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            required: true,
        }
    }

    /// Treat a missing file as an empty tree rather than an error.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl ConfigProvider for FileProvider {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Value, SettingsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.required => {
                debug!(path = %self.path.display(), "Optional config file absent");
                return Ok(Value::Object(Map::new()));
            }
            Err(e) => {
                return Err(SettingsError::Provider {
                    name: self.name(),
                    reason: e.to_string(),
                });
            }
        };

        let value = match self.format {
            FileFormat::Json => {
                let json: Value =
                    serde_json::from_str(&content).map_err(|e| SettingsError::Provider {
                        name: self.name(),
                        reason: e.to_string(),
                    })?;
                json
            }
            FileFormat::Toml => {
                let toml: toml::Value =
                    toml::from_str(&content).map_err(|e| SettingsError::Provider {
                        name: self.name(),
                        reason: e.to_string(),
                    })?;
                toml_to_json(toml)
            }
            FileFormat::Yaml => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(&content).map_err(|e| SettingsError::Provider {
                        name: self.name(),
                        reason: e.to_string(),
                    })?;
                yaml_to_json(yaml)
            }
        };

        info!(path = %self.path.display(), "Loaded configuration file");
        Ok(value)
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Environment variable provider.
///
/// Variables starting with the prefix are mapped to nested keys: the
/// prefix is stripped, the remainder is split on the separator and
/// lowercased. `APP__LOGGING__LEVEL=debug` with prefix `APP` becomes
/// `logging.level = "debug"`.
pub struct EnvProvider {
    prefix: String,
    separator: String,
}

impl EnvProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: "__".to_string(),
        }
    }

    /// Set the separator for nested keys.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl ConfigProvider for EnvProvider {
    fn name(&self) -> String {
        format!("env:{}", self.prefix)
    }

    fn load(&self) -> Result<Value, SettingsError> {
        let mut tree = Map::new();
        let mut count = 0usize;

        for (key, raw) in env::vars() {
            let Some(stripped) = key.strip_prefix(&self.prefix) else {
                continue;
            };
            let stripped = stripped.trim_start_matches('_');
            if stripped.is_empty() {
                continue;
            }

            let parts: Vec<String> = stripped
                .split(&self.separator)
                .map(|s| s.to_lowercase())
                .collect();
            let parts: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();

            set_path(&mut tree, &parts, parse_scalar(&raw));
            count += 1;
            debug!(var = %key, "Loaded environment override");
        }

        info!(prefix = %self.prefix, count, "Loaded environment variables");
        Ok(Value::Object(tree))
    }
}

/// Command-line override provider.
///
/// Holds dotted-path/value pairs already extracted by the CLI layer,
/// e.g. `("logging.level", "debug")`. Registration helpers that parse
/// argv belong to the caller, not this crate.
pub struct CliProvider {
    overrides: Vec<(String, String)>,
}

impl CliProvider {
    pub fn new(overrides: Vec<(String, String)>) -> Self {
        Self { overrides }
    }
}

impl ConfigProvider for CliProvider {
    fn name(&self) -> String {
        "cli".to_string()
    }

    fn load(&self) -> Result<Value, SettingsError> {
        let mut tree = Map::new();

        for (path, raw) in &self.overrides {
            let parts: Vec<&str> = path.split('.').collect();
            set_path(&mut tree, &parts, parse_scalar(raw));
        }

        Ok(Value::Object(tree))
    }
}

/// Detect file format from extension.
fn detect_format(path: &Path) -> Result<FileFormat, SettingsError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("toml") => Ok(FileFormat::Toml),
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        _ => Err(SettingsError::Provider {
            name: path.display().to_string(),
            reason: "unknown config file format".to_string(),
        }),
    }
}

/// Parse a raw env/CLI string into the most specific JSON scalar.
fn parse_scalar(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    // Inline JSON for arrays and objects
    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<Value>(raw) {
            return json;
        }
    }
    Value::String(raw.to_string())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::String(s) => Value::String(s),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                if let serde_yaml::Value::String(key) = k {
                    map.insert(key, yaml_to_json(v));
                }
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}
