//! Refresh triggers and the serializing refresh loop.
//!
//! # Data Flow
//! ```text
//! interval timer ──┐
//! config watcher ──┼──▶ mpsc queue ──▶ RefreshLoop ──▶ Refresher ──▶ DocumentStore
//! SIGHUP ──────────┘
//! ```
//!
//! # Design Decisions
//! - A single task executes refresh work, one command at a time, so two
//!   triggers never reconfigure concurrently
//! - Producers use `try_send`; a full queue means a refresh is already pending
//!   and the extra trigger is dropped

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, MissedTickBehavior};

use crate::discovery::engine::Refresher;

/// Queue depth for pending refresh commands.
pub const QUEUE_CAPACITY: usize = 8;

/// Work item for the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCommand {
    /// Reload config and rebuild the provider client.
    Reconfigure,
    /// Recompute documents with the current config and client.
    Recompute,
    /// Reconfigure, then recompute.
    Reload,
}

/// Create the refresh queue.
pub fn queue() -> (mpsc::Sender<RefreshCommand>, mpsc::Receiver<RefreshCommand>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Consumes refresh commands and runs them sequentially.
pub struct RefreshLoop {
    refresher: Refresher,
    commands: mpsc::Receiver<RefreshCommand>,
}

impl RefreshLoop {
    pub fn new(refresher: Refresher, commands: mpsc::Receiver<RefreshCommand>) -> Self {
        Self { refresher, commands }
    }

    /// Run until shutdown or until every sender is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(config = ?self.refresher.config_path(), "Refresh loop starting");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Refresh loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn execute(&self, command: RefreshCommand) {
        tracing::debug!(?command, "Executing refresh command");

        if matches!(command, RefreshCommand::Reconfigure | RefreshCommand::Reload) {
            if let Err(e) = self.refresher.reconfigure().await {
                tracing::error!(error = %e, "Failed to update config and client, keeping current state");
            }
        }

        if matches!(command, RefreshCommand::Recompute | RefreshCommand::Reload) {
            self.refresher.recompute().await;
        }
    }
}

/// Fixed-interval trigger.
///
/// Sends `Reload` immediately, then `Recompute` on every tick.
pub async fn run_ticker(
    interval: Duration,
    commands: mpsc::Sender<RefreshCommand>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval = ?interval, "Refresh ticker starting");

    if commands.send(RefreshCommand::Reload).await.is_err() {
        return;
    }

    if interval.is_zero() {
        tracing::error!("Refresh interval is zero, periodic refresh disabled");
        return;
    }

    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match commands.try_send(RefreshCommand::Recompute) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("Refresh queue full, skipping tick");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            },
            _ = shutdown.recv() => {
                tracing::info!("Refresh ticker received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// Reload on SIGHUP.
#[cfg(unix)]
pub async fn run_reload_signal(
    commands: mpsc::Sender<RefreshCommand>,
    mut shutdown: broadcast::Receiver<()>,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler, reload on signal disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("SIGHUP received, reloading configuration");
                if commands.try_send(RefreshCommand::Reload).is_err() {
                    tracing::debug!("Refresh queue full, reload already pending");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Reload on SIGHUP (no-op on platforms without it).
#[cfg(not(unix))]
pub async fn run_reload_signal(
    _commands: mpsc::Sender<RefreshCommand>,
    _shutdown: broadcast::Receiver<()>,
) {
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use crate::discovery::store::DocumentStore;
    use crate::lifecycle::Shutdown;
    use crate::provider::CredentialSource;

    const CONFIG: &str = r#"
provider:
  type: static
  metadata:
    zones:
      - name: example.com.
        records: [{name: web-1.example.com}]
rules:
  - {path: /web, port: 80, filters: ["^web"]}
"#;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_reload_then_recompute() {
        let file = config_file(CONFIG);
        let store = Arc::new(DocumentStore::new());
        let refresher = Refresher::new(store.clone(), file.path(), CredentialSource::default());

        let (tx, rx) = queue();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(RefreshLoop::new(refresher, rx).run(shutdown.subscribe()));

        tx.send(RefreshCommand::Reload).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let web = store.get("/web").unwrap();
        assert_eq!(web[0].targets, vec!["web-1.example.com:80"]);
    }

    #[tokio::test]
    async fn test_broken_reload_keeps_serving() {
        let file = config_file(CONFIG);
        let store = Arc::new(DocumentStore::new());
        let refresher = Refresher::new(store.clone(), file.path(), CredentialSource::default());

        let (tx, rx) = queue();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(RefreshLoop::new(refresher, rx).run(shutdown.subscribe()));

        tx.send(RefreshCommand::Reload).await.unwrap();
        while store.get("/web").is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        std::fs::write(file.path(), "rules: [not, a, config").unwrap();
        tx.send(RefreshCommand::Reload).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.config.as_ref().unwrap().rules.len(), 1);
        assert_eq!(store.get("/web").unwrap()[0].targets, vec!["web-1.example.com:80"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_sends_reload_then_recompute() {
        let (tx, mut rx) = queue();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_ticker(Duration::from_secs(60), tx, shutdown.subscribe()));

        assert_eq!(rx.recv().await, Some(RefreshCommand::Reload));
        time::advance(Duration::from_secs(61)).await;
        assert_eq!(rx.recv().await, Some(RefreshCommand::Recompute));

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_ticker_with_zero_interval_only_reloads() {
        let (tx, mut rx) = queue();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_ticker(Duration::ZERO, tx, shutdown.subscribe()));

        assert_eq!(rx.recv().await, Some(RefreshCommand::Reload));
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let store = Arc::new(DocumentStore::new());
        let refresher = Refresher::new(store, "/nonexistent.yaml", CredentialSource::default());
        let (_tx, rx) = queue();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(RefreshLoop::new(refresher, rx).run(shutdown.subscribe()));

        tokio::task::yield_now().await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
