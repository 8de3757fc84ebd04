//! # Settings Manager
//!
//! Orchestrates the two-tier lookup: the in-memory copy of the overlay
//! document is checked first, the composed base chain second. Writes
//! and deletes go to the overlay store; after every successful
//! mutation the overlay tier is reloaded from disk so readers observe
//! the change immediately.
//!
//! The base chain composed without the overlay *is* the default
//! snapshot: it answers "what would this value be with no runtime
//! overrides", which is how the manager decides between storing and
//! deleting on save.

use crate::composed::ComposedConfig;
use crate::overlay::OverlayStore;
use crate::provider::ConfigProvider;
use crate::value::join_path;
use errors::{SettingRef, SettingsError};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Mutable runtime settings over an immutable base chain.
///
/// Single logical owner of the overlay file. Mutations are blocking
/// read-modify-rewrite operations; concurrent callers racing on the
/// same key get last-writer-wins.
pub struct SettingsManager {
    defaults: ComposedConfig,
    store: OverlayStore,
    overrides: RwLock<Map<String, Value>>,
}

impl SettingsManager {
    /// Build the manager from the base provider chain and the overlay
    /// file path.
    ///
    /// The base chain must not include the overlay file itself; it is
    /// composed once here as the default snapshot.
    pub fn new(
        base_providers: Vec<Arc<dyn ConfigProvider>>,
        overlay_path: impl Into<std::path::PathBuf>,
    ) -> Result<Self, SettingsError> {
        let defaults = ComposedConfig::new(base_providers)?;
        let store = OverlayStore::new(overlay_path);
        let overrides = store.read_document()?;

        Ok(Self {
            defaults,
            store,
            overrides: RwLock::new(overrides),
        })
    }

    /// Build the manager, resolving the overlay path from the chain.
    ///
    /// An explicit path wins; otherwise the overlay is placed next to
    /// the conventionally named base settings file, falling back to
    /// the working directory. See [`resolve_overlay_path`].
    ///
    /// [`resolve_overlay_path`]: crate::resolve::resolve_overlay_path
    pub fn with_resolved_path(
        base_providers: Vec<Arc<dyn ConfigProvider>>,
        explicit: Option<std::path::PathBuf>,
    ) -> Result<Self, SettingsError> {
        let overlay_path = crate::resolve::resolve_overlay_path(&base_providers, explicit);
        Self::new(base_providers, overlay_path)
    }

    /// The default snapshot: the composed base chain without overlay.
    pub fn defaults(&self) -> &ComposedConfig {
        &self.defaults
    }

    /// Path of the overlay store file.
    pub fn overlay_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Persist a sectioned setting, or reset it when `value` equals
    /// the default.
    ///
    /// Equal-to-default values are never stored: the overlay entry is
    /// deleted instead (a no-op when absent), so the overlay only ever
    /// contains genuine overrides.
    pub fn save<T: Serialize>(
        &self,
        section: &str,
        key: &str,
        value: &T,
    ) -> Result<(), SettingsError> {
        self.save_setting(&SettingRef::new(section, key), value)
    }

    /// Persist a root-level setting (no section).
    pub fn save_root<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        self.save_setting(&SettingRef::root(key), value)
    }

    /// Whether `value` equals the default snapshot's value for the
    /// section/key path. Never mutates state.
    ///
    /// Comparison is structural over the serialized JSON trees, so it
    /// is insensitive to formatting and property order. A `null` value
    /// equals an absent default; `null` against any non-null default
    /// does not.
    pub fn is_default_value<T: Serialize>(
        &self,
        section: &str,
        key: &str,
        value: &T,
    ) -> Result<bool, SettingsError> {
        let setting = SettingRef::new(section, key);
        let serialized = self.serialize_value(&setting, value)?;
        Ok(self.matches_default(&setting, &serialized))
    }

    /// Remove a sectioned override so the key falls back to its
    /// default. Missing file or absent key is a no-op that leaves the
    /// file untouched.
    pub fn reset_to_default(&self, section: &str, key: &str) -> Result<(), SettingsError> {
        self.reset_setting(&SettingRef::new(section, key))
    }

    /// Remove a root-level override, symmetric with [`save_root`].
    ///
    /// [`save_root`]: Self::save_root
    pub fn reset_to_default_root(&self, key: &str) -> Result<(), SettingsError> {
        self.reset_setting(&SettingRef::root(key))
    }

    /// Current value for a sectioned setting: override tier first,
    /// default snapshot second.
    pub fn get<T: DeserializeOwned>(&self, section: &str, key: &str) -> Option<T> {
        let value = self.get_value(section, key)?;
        serde_json::from_value(value).ok()
    }

    /// Current value for a root-level setting.
    pub fn get_root<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get("", key)
    }

    /// Raw current value at the section/key path.
    pub fn get_value(&self, section: &str, key: &str) -> Option<Value> {
        let setting = SettingRef::new(section, key);

        {
            let overrides = self.overrides.read();
            if let Some(value) = override_at(&overrides, &setting) {
                return Some(value.clone());
            }
        }

        self.defaults.get_value(&join_path(section, key))
    }

    /// Whether the setting currently carries an explicit override.
    pub fn is_overridden(&self, section: &str, key: &str) -> bool {
        let overrides = self.overrides.read();
        override_at(&overrides, &SettingRef::new(section, key)).is_some()
    }

    /// Re-read the overlay document from disk into the override tier.
    ///
    /// Called after every successful mutation; also usable by external
    /// watchers when the file changed behind the manager's back.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let doc = self.store.read_document()?;
        *self.overrides.write() = doc;
        debug!(path = %self.store.path().display(), "Overlay tier reloaded");
        Ok(())
    }

    fn save_setting<T: Serialize>(
        &self,
        setting: &SettingRef,
        value: &T,
    ) -> Result<(), SettingsError> {
        // Serialize before any file is touched.
        let serialized = match self.serialize_value(setting, value) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!(setting = %setting, error = %e, "Failed to serialize setting value");
                return Err(e);
            }
        };

        let result = if self.matches_default(setting, &serialized) {
            match self.store.remove(setting) {
                Ok(removed) => {
                    if removed {
                        info!(setting = %setting, "Override equal to default, entry removed");
                    } else {
                        debug!(setting = %setting, "Value equals default, nothing stored");
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        } else {
            self.store.upsert(setting, serialized).map(|()| {
                info!(setting = %setting, "Override persisted");
            })
        };

        if let Err(e) = result {
            error!(setting = %setting, error = %e, "Failed to save setting");
            return Err(e);
        }

        if let Err(e) = self.reload() {
            error!(setting = %setting, error = %e, "Failed to reload overlay after save");
            return Err(e);
        }

        Ok(())
    }

    fn reset_setting(&self, setting: &SettingRef) -> Result<(), SettingsError> {
        let removed = match self.store.remove(setting) {
            Ok(removed) => removed,
            Err(e) => {
                error!(setting = %setting, error = %e, "Failed to reset setting");
                return Err(e);
            }
        };

        if removed {
            info!(setting = %setting, "Setting reset to default");
            if let Err(e) = self.reload() {
                error!(setting = %setting, error = %e, "Failed to reload overlay after reset");
                return Err(e);
            }
        }

        Ok(())
    }

    fn serialize_value<T: Serialize>(
        &self,
        setting: &SettingRef,
        value: &T,
    ) -> Result<Value, SettingsError> {
        serde_json::to_value(value).map_err(|e| SettingsError::Serialization {
            setting: setting.clone(),
            reason: e.to_string(),
        })
    }

    fn matches_default(&self, setting: &SettingRef, serialized: &Value) -> bool {
        let path = join_path(&setting.section, &setting.key);
        let default = self.defaults.get_value(&path).unwrap_or(Value::Null);
        *serialized == default
    }
}

/// Look up a setting in the override tier without cloning it.
///
/// The overlay document is exactly two levels deep: a section name is
/// one top-level key even when it contains dots, matching how the
/// store writes it.
fn override_at<'a>(overrides: &'a Map<String, Value>, setting: &SettingRef) -> Option<&'a Value> {
    if setting.is_root() {
        return overrides.get(&setting.key);
    }

    match overrides.get(&setting.section) {
        Some(Value::Object(section)) => section.get(&setting.key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FileProvider;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn manager_with_defaults(dir: &Path, defaults: &Value) -> SettingsManager {
        let base_path = dir.join("settings.json");
        fs::write(&base_path, serde_json::to_string(defaults).unwrap()).unwrap();
        let provider: Arc<dyn ConfigProvider> = Arc::new(FileProvider::new(&base_path).unwrap());

        SettingsManager::new(vec![provider], dir.join("settings.overlay.json")).unwrap()
    }

    fn overlay_json(manager: &SettingsManager) -> Value {
        let content = fs::read_to_string(manager.overlay_path()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn test_save_non_default_persists_override() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.save("logging", "level", &"debug").unwrap();

        assert_eq!(
            overlay_json(&manager),
            json!({"logging": {"level": "debug"}})
        );
        assert_eq!(
            manager.get::<String>("logging", "level").unwrap(),
            "debug"
        );
        assert!(manager.is_overridden("logging", "level"));
    }

    #[test]
    fn test_save_back_to_default_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.save("logging", "level", &"debug").unwrap();
        assert!(manager.overlay_path().exists());

        // Equal to default: the only entry collapses and the file goes away.
        manager.save("logging", "level", &"info").unwrap();
        assert!(!manager.overlay_path().exists());
        assert_eq!(manager.get::<String>("logging", "level").unwrap(), "info");
        assert!(!manager.is_overridden("logging", "level"));
    }

    #[test]
    fn test_save_default_value_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(dir.path(), &json!({"timeout": 30}));

        manager.save_root("timeout", &30).unwrap();

        assert!(!manager.overlay_path().exists());
        assert_eq!(manager.get_root::<u64>("timeout").unwrap(), 30);
    }

    #[test]
    fn test_save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.save("logging", "level", &"debug").unwrap();
        let first = fs::read_to_string(manager.overlay_path()).unwrap();
        manager.save("logging", "level", &"debug").unwrap();
        let second = fs::read_to_string(manager.overlay_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_save_root_level_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(dir.path(), &json!({"timeout": 30}));

        manager.save_root("timeout", &45).unwrap();

        assert_eq!(overlay_json(&manager), json!({"timeout": 45}));
        assert_eq!(manager.get_root::<u64>("timeout").unwrap(), 45);
    }

    #[test]
    fn test_is_default_value_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(
            dir.path(),
            &json!({"logging": {"level": "info"}, "timeout": 30}),
        );

        assert!(manager.is_default_value("logging", "level", &"info").unwrap());
        assert!(!manager.is_default_value("logging", "level", &"debug").unwrap());
        assert!(manager.is_default_value("", "timeout", &30).unwrap());
        assert!(!manager.is_default_value("", "timeout", &31).unwrap());
    }

    #[test]
    fn test_is_default_value_null_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        // Absent default equals null, not any concrete value.
        let none: Option<String> = None;
        assert!(manager.is_default_value("logging", "format", &none).unwrap());
        assert!(!manager.is_default_value("logging", "format", &"json").unwrap());
        assert!(!manager.is_default_value("logging", "level", &none).unwrap());
    }

    #[test]
    fn test_is_default_value_structural() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(
            dir.path(),
            &json!({"retry": {"policy": {"attempts": 3, "backoff": "fixed"}}}),
        );

        #[derive(Serialize)]
        struct Policy {
            attempts: u32,
            backoff: String,
        }

        let same = Policy {
            attempts: 3,
            backoff: "fixed".to_string(),
        };
        let different = Policy {
            attempts: 5,
            backoff: "fixed".to_string(),
        };

        assert!(manager.is_default_value("retry", "policy", &same).unwrap());
        assert!(!manager.is_default_value("retry", "policy", &different).unwrap());
    }

    #[test]
    fn test_reset_to_default_removes_section_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.save("logging", "level", &"debug").unwrap();
        manager.reset_to_default("logging", "level").unwrap();

        assert!(!manager.overlay_path().exists());
        assert_eq!(manager.get::<String>("logging", "level").unwrap(), "info");
    }

    #[test]
    fn test_reset_keeps_unrelated_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(
            dir.path(),
            &json!({"logging": {"level": "info"}, "network": {"port": 80}}),
        );

        manager.save("logging", "level", &"debug").unwrap();
        manager.save("network", "port", &8080).unwrap();

        manager.reset_to_default("logging", "level").unwrap();

        assert_eq!(overlay_json(&manager), json!({"network": {"port": 8080}}));
        assert_eq!(manager.get::<u64>("network", "port").unwrap(), 8080);
    }

    #[test]
    fn test_reset_root_key_symmetric_with_save() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(dir.path(), &json!({"timeout": 30}));

        manager.save_root("timeout", &45).unwrap();
        manager.reset_to_default_root("timeout").unwrap();

        assert!(!manager.overlay_path().exists());
        assert_eq!(manager.get_root::<u64>("timeout").unwrap(), 30);
    }

    #[test]
    fn test_reset_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.reset_to_default("logging", "level").unwrap();
        assert!(!manager.overlay_path().exists());
    }

    #[test]
    fn test_missing_overlay_equals_empty_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        // No overlay file at all.
        let without_file = manager.get::<String>("logging", "level").unwrap();

        // Overlay file containing {}.
        fs::write(manager.overlay_path(), "{}").unwrap();
        manager.reload().unwrap();
        let with_empty = manager.get::<String>("logging", "level").unwrap();

        assert_eq!(without_file, with_empty);
    }

    #[test]
    fn test_save_surfaces_malformed_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        fs::write(manager.overlay_path(), "{broken").unwrap();

        let result = manager.save("logging", "level", &"debug");
        assert!(matches!(
            result,
            Err(SettingsError::MalformedOverlay { .. })
        ));

        // The broken file is preserved, never truncated.
        assert_eq!(
            fs::read_to_string(manager.overlay_path()).unwrap(),
            "{broken"
        );
    }

    #[test]
    fn test_overlay_loaded_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("settings.json");
        fs::write(&base_path, r#"{"logging": {"level": "info"}}"#).unwrap();
        let overlay_path = dir.path().join("settings.overlay.json");
        fs::write(&overlay_path, r#"{"logging": {"level": "trace"}}"#).unwrap();

        let provider: Arc<dyn ConfigProvider> = Arc::new(FileProvider::new(&base_path).unwrap());
        let manager = SettingsManager::new(vec![provider], &overlay_path).unwrap();

        assert_eq!(manager.get::<String>("logging", "level").unwrap(), "trace");
        // The default snapshot still answers without the overlay.
        assert_eq!(
            manager.defaults().get::<String>("logging.level").unwrap(),
            "info"
        );
    }

    #[test]
    fn test_with_resolved_path_sits_next_to_base_file() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join(crate::resolve::BASE_SETTINGS_FILE);
        fs::write(&base_path, r#"{"logging": {"level": "info"}}"#).unwrap();
        let provider: Arc<dyn ConfigProvider> = Arc::new(FileProvider::new(&base_path).unwrap());

        let manager = SettingsManager::with_resolved_path(vec![provider], None).unwrap();
        assert_eq!(
            manager.overlay_path(),
            dir.path().join(crate::resolve::OVERLAY_FILE_NAME)
        );

        manager.save("logging", "level", &"debug").unwrap();
        assert!(dir.path().join(crate::resolve::OVERLAY_FILE_NAME).exists());
    }

    #[test]
    fn test_dotted_section_name_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(
            dir.path(),
            &json!({"logging": {"console": {"level": "info"}}}),
        );

        // The section name carries a dot; the overlay keeps it as one
        // top-level key and lookups must find it there.
        manager.save("logging.console", "level", &"debug").unwrap();

        assert_eq!(
            overlay_json(&manager),
            json!({"logging.console": {"level": "debug"}})
        );
        assert_eq!(
            manager.get::<String>("logging.console", "level").unwrap(),
            "debug"
        );
        assert!(manager.is_overridden("logging.console", "level"));

        // Saving the default back collapses the entry like any other.
        manager.save("logging.console", "level", &"info").unwrap();
        assert!(!manager.overlay_path().exists());
        assert_eq!(
            manager.get::<String>("logging.console", "level").unwrap(),
            "info"
        );
    }

    #[test]
    fn test_serialization_failure_touches_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        // Maps with non-string keys cannot become JSON objects.
        let mut bad = std::collections::HashMap::new();
        bad.insert((1u32, 2u32), "x".to_string());

        let result = manager.save("logging", "level", &bad);
        assert!(matches!(result, Err(SettingsError::Serialization { .. })));
        assert!(!manager.overlay_path().exists());
    }

    #[test]
    fn test_serialization_failure_keeps_existing_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_with_defaults(dir.path(), &json!({"logging": {"level": "info"}}));

        manager.save("logging", "level", &"debug").unwrap();
        let before = fs::read_to_string(manager.overlay_path()).unwrap();

        let mut bad = std::collections::HashMap::new();
        bad.insert((1u32, 2u32), "x".to_string());
        assert!(manager.save("logging", "format", &bad).is_err());

        assert_eq!(
            fs::read_to_string(manager.overlay_path()).unwrap(),
            before
        );
    }

    #[test]
    fn test_round_trip_complex_value() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_defaults(dir.path(), &json!({"sinks": {"list": ["stdout"]}}));

        manager
            .save("sinks", "list", &vec!["stdout", "file"])
            .unwrap();

        let read: Vec<String> = manager.get("sinks", "list").unwrap();
        assert_eq!(read, vec!["stdout".to_string(), "file".to_string()]);
    }
}
