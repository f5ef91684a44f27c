//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::discovery::triggers::RefreshCommand;

/// A watcher that monitors the configuration file for changes.
///
/// The parent directory is watched rather than the file itself so that
/// editors replacing the file through a rename are still noticed.
pub struct ConfigWatcher {
    path: PathBuf,
    commands: mpsc::Sender<RefreshCommand>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher feeding the refresh queue.
    pub fn new(path: &Path, commands: mpsc::Sender<RefreshCommand>) -> Self {
        Self {
            path: path.to_path_buf(),
            commands,
        }
    }

    /// Start watching the file on the notify background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.commands.clone();
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let watched_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_config {
                        return;
                    }

                    tracing::info!(paths = ?event.paths, "Config file change detected, reloading");
                    if tx.try_send(RefreshCommand::Reload).is_err() {
                        tracing::debug!("Refresh queue full, reload already pending");
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            NotifyConfig::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
