//! # Overlay Path Resolution
//!
//! Determines where the overlay file lives, given the already
//! configured base providers.
//!
//! Precedence: an explicit override path wins; otherwise the overlay
//! is placed next to the conventionally named base settings file, if
//! one of the file providers carries it; otherwise it lands in the
//! process working directory.

use crate::provider::ConfigProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Conventional name of the primary base settings file.
pub const BASE_SETTINGS_FILE: &str = "settings.json";

/// File name used for the writable overlay.
pub const OVERLAY_FILE_NAME: &str = "settings.overlay.json";

/// Resolve the overlay file path for a provider chain.
pub fn resolve_overlay_path(
    providers: &[Arc<dyn ConfigProvider>],
    explicit: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "Using explicit overlay path");
        return path;
    }

    for provider in providers {
        let Some(path) = provider.file_path() else {
            continue;
        };
        if path.file_name().and_then(|n| n.to_str()) == Some(BASE_SETTINGS_FILE) {
            if let Some(dir) = path.parent() {
                let resolved = dir.join(OVERLAY_FILE_NAME);
                debug!(path = %resolved.display(), "Overlay placed next to base settings file");
                return resolved;
            }
        }
    }

    std::env::current_dir()
        .map(|dir| dir.join(OVERLAY_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(OVERLAY_FILE_NAME))
}
