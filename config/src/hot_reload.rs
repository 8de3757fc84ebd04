//! # Overlay Hot Reload
//!
//! Watches the overlay file for external changes and emits reload
//! events. The settings manager reloads synchronously after its own
//! writes; this watcher covers edits made behind its back (operators
//! touching the file, deployment tooling, etc.).
//!
//! The parent directory is watched rather than the file itself so
//! creation and deletion of the overlay are observed too; the overlay
//! file legitimately comes and goes as overrides are added and reset.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Overlay reload event.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayReloadEvent {
    /// The watcher is installed and events will flow.
    Ready,

    /// Overlay file content changed.
    Changed(PathBuf),

    /// Overlay file was created.
    Created(PathBuf),

    /// Overlay file was removed (all overrides reset).
    Removed(PathBuf),

    /// Watcher failure.
    Error { path: PathBuf, error: String },
}

/// Watch the overlay file for changes and emit reload events.
///
/// The returned sender keeps the channel open for the caller; dropping
/// the receiver stops the watcher task.
pub async fn watch_overlay(
    overlay_path: &Path,
) -> anyhow::Result<(
    tokio::sync::mpsc::Sender<OverlayReloadEvent>,
    tokio::sync::mpsc::Receiver<OverlayReloadEvent>,
)> {
    let overlay_path = overlay_path.to_path_buf();
    let watch_dir = overlay_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if !watch_dir.exists() {
        anyhow::bail!("Overlay directory not found: {:?}", watch_dir);
    }

    let (tx, rx) = tokio::sync::mpsc::channel(100);
    let tx_task = tx.clone();

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                let error_msg = format!("Failed to create file watcher: {}", e);
                error!("{}", error_msg);

                let _ = tx_task
                    .send(OverlayReloadEvent::Error {
                        path: overlay_path,
                        error: error_msg,
                    })
                    .await;

                return;
            }
        };

        if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            let error_msg = format!("Failed to watch overlay directory: {}", e);
            error!("{}", error_msg);

            let _ = tx_task
                .send(OverlayReloadEvent::Error {
                    path: overlay_path,
                    error: error_msg,
                })
                .await;

            return;
        }

        info!(path = %overlay_path.display(), "Watching overlay file");

        let _ = tx_task.send(OverlayReloadEvent::Ready).await;

        let overlay_name = overlay_path.file_name().map(std::ffi::OsStr::to_os_string);

        loop {
            tokio::select! {
                _ = tx_task.closed() => {
                    debug!(path = %overlay_path.display(), "Receiver dropped, stopping overlay watcher");
                    break;
                }
                event_result = event_rx.recv() => {
                    let Some(event_result) = event_result else {
                        break;
                    };

                    match event_result {
                        Ok(event) => {
                            // Directory watch: keep only events for our file.
                            let Some(path) = event
                                .paths
                                .iter()
                                .find(|p| p.file_name().map(std::ffi::OsStr::to_os_string) == overlay_name)
                                .cloned()
                            else {
                                continue;
                            };

                            let reload_event = match event.kind {
                                EventKind::Create(_) => {
                                    info!(path = %path.display(), "Overlay file created");
                                    OverlayReloadEvent::Created(path)
                                }
                                EventKind::Modify(_) => {
                                    info!(path = %path.display(), "Overlay file updated");
                                    OverlayReloadEvent::Changed(path)
                                }
                                EventKind::Remove(_) => {
                                    warn!(path = %path.display(), "Overlay file removed");
                                    OverlayReloadEvent::Removed(path)
                                }
                                _ => {
                                    debug!(kind = ?event.kind, "Ignoring event");
                                    continue;
                                }
                            };

                            if let Err(e) = tx_task.send(reload_event).await {
                                error!("Failed to send overlay reload event: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Watch error: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok((tx, rx))
}
