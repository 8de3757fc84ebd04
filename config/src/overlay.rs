//! # Overlay Store
//!
//! The single mutable persistence layer: a JSON document on disk
//! mapping section names to key/value pairs, with root-level keys
//! stored directly at the top level.
//!
//! Every mutation reads the whole document, modifies it in memory and
//! rewrites the file wholesale. A missing file is equivalent to an
//! empty document; malformed content is a fatal read error and is
//! never silently reset.

use errors::{SettingRef, SettingsError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk JSON overlay document.
pub struct OverlayStore {
    path: PathBuf,
}

impl OverlayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. Missing file yields an empty document.
    pub fn read_document(&self) -> Result<Map<String, Value>, SettingsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(SettingsError::Store {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let value: Value =
            serde_json::from_str(&content).map_err(|e| SettingsError::MalformedOverlay {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(SettingsError::MalformedOverlay {
                path: self.path.clone(),
                reason: format!("expected a JSON object, found {}", type_name(&other)),
            }),
        }
    }

    /// Rewrite the whole document. An empty document removes the file.
    pub fn write_document(&self, doc: &Map<String, Value>) -> Result<(), SettingsError> {
        if doc.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path).map_err(|e| SettingsError::Store {
                    path: self.path.clone(),
                    source: e,
                })?;
                debug!(path = %self.path.display(), "Removed empty overlay file");
            }
            return Ok(());
        }

        let content =
            serde_json::to_string_pretty(doc).map_err(|e| SettingsError::MalformedOverlay {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        fs::write(&self.path, content).map_err(|e| SettingsError::Store {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Insert or replace a value at the section/key path.
    ///
    /// An empty section writes at the document root. A root entry that
    /// is not an object is replaced wholesale when a section of the
    /// same name is written: any object-valued root key is a section.
    pub fn upsert(&self, setting: &SettingRef, value: Value) -> Result<(), SettingsError> {
        let mut doc = self.read_document()?;

        if setting.is_root() {
            doc.insert(setting.key.clone(), value);
        } else {
            match doc.get_mut(&setting.section) {
                Some(Value::Object(section)) => {
                    section.insert(setting.key.clone(), value);
                }
                _ => {
                    let mut section = Map::new();
                    section.insert(setting.key.clone(), value);
                    doc.insert(setting.section.clone(), Value::Object(section));
                }
            }
        }

        self.write_document(&doc)
    }

    /// Remove the entry at the section/key path if present.
    ///
    /// Removing the last key of a section removes the section;
    /// emptying the document removes the file. The file is left
    /// untouched when nothing changed. Returns whether an entry was
    /// removed.
    pub fn remove(&self, setting: &SettingRef) -> Result<bool, SettingsError> {
        if !self.path.exists() {
            return Ok(false);
        }

        let mut doc = self.read_document()?;

        let removed = if setting.is_root() {
            doc.remove(&setting.key).is_some()
        } else {
            match doc.get_mut(&setting.section) {
                Some(Value::Object(section)) => {
                    let removed = section.remove(&setting.key).is_some();
                    if removed && section.is_empty() {
                        doc.remove(&setting.section);
                    }
                    removed
                }
                _ => false,
            }
        };

        if removed {
            self.write_document(&doc)?;
        }

        Ok(removed)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
