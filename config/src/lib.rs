//! # Layered Runtime Configuration
//!
//! Layered, mutable runtime configuration with a writable overlay.
//!
//! This crate provides:
//! - An ordered chain of read-only providers (files, environment,
//!   command line) composed into one view
//! - A writable JSON overlay for persisting individual settings at
//!   runtime
//! - Default detection: a saved value equal to its default deletes the
//!   override instead of storing it
//! - Reset-to-default per key, with section and file cleanup
//! - Hot reload of the overlay file via file system watching
//!
//! # Lookup model
//!
//! Reads go through an explicit two-tier lookup: the in-memory copy of
//! the overlay document first, the composed base chain second. The
//! base chain composed without the overlay doubles as the default
//! snapshot used to decide whether a value is an explicit override.
//!
//! # Best Practices
//!
//! - All mutations rewrite the overlay document wholesale; the worst
//!   crash outcome is the previous file surviving intact
//! - Failures are logged with section/key context and propagated;
//!   there is no silent-degrade path

pub mod composed;
pub mod hot_reload;
pub mod manager;
pub mod overlay;
pub mod provider;
pub mod resolve;
pub mod value;

pub use composed::ComposedConfig;
pub use errors::{SettingRef, SettingsError};
pub use hot_reload::{OverlayReloadEvent, watch_overlay};
pub use manager::SettingsManager;
pub use overlay::OverlayStore;
pub use provider::{CliProvider, ConfigProvider, EnvProvider, FileFormat, FileProvider};
pub use resolve::{BASE_SETTINGS_FILE, OVERLAY_FILE_NAME, resolve_overlay_path};
