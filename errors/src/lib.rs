//! # Settings Errors
//!
//! Error taxonomy for the layered runtime settings system.
//!
//! - Uses `thiserror` for structured error definitions
//! - Every variant carries enough context (section/key or path) for
//!   callers to log and decide retry policy
//! - No variant is ever recovered from silently; callers must treat a
//!   failed operation as leaving configuration state unchanged

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the settings overlay and composed configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Overlay file unreadable or unwritable.
    #[error("I/O failure on overlay store {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The overlay store exists but does not contain valid JSON.
    ///
    /// Never auto-repaired: surfacing the parse error instead of
    /// resetting to an empty document prevents silent data loss.
    #[error("Malformed overlay document at {path}: {reason}")]
    MalformedOverlay { path: PathBuf, reason: String },

    /// A value could not be serialized for persistence. Raised before
    /// any file is touched.
    #[error("Cannot serialize value for setting {setting}: {reason}")]
    Serialization { setting: SettingRef, reason: String },

    /// A base provider failed to produce its configuration tree.
    #[error("Provider {name} failed to load: {reason}")]
    Provider { name: String, reason: String },
}

/// A section/key pair identifying one overridable setting.
///
/// An empty section addresses a root-level key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRef {
    pub section: String,
    pub key: String,
}

impl SettingRef {
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Root-level key with no section.
    pub fn root(key: impl Into<String>) -> Self {
        Self {
            section: String::new(),
            key: key.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.section.is_empty()
    }
}

impl std::fmt::Display for SettingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.section.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}:{}", self.section, self.key)
        }
    }
}
