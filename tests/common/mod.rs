//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dns_http_sd::discovery::{triggers, DocumentStore, RefreshCommand, RefreshLoop, Refresher};
use dns_http_sd::http::HttpServer;
use dns_http_sd::lifecycle::Shutdown;
use dns_http_sd::provider::CredentialSource;

/// Write `content` to a fresh YAML file.
pub fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Replace the file at `path` in one rename so readers never see a partial write.
pub fn replace_file(path: &Path, content: &str) {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, content).unwrap();
    std::fs::rename(&staging, path).unwrap();
}

/// A running refresh loop plus HTTP surface on an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub store: Arc<DocumentStore>,
    pub commands: mpsc::Sender<RefreshCommand>,
    pub shutdown: Shutdown,
}

impl TestService {
    /// Start without sending any refresh command.
    pub async fn start(config_path: &Path, credentials: CredentialSource) -> Self {
        let shutdown = Shutdown::new();
        let store = Arc::new(DocumentStore::new());
        let (commands, queue) = triggers::queue();

        let refresher = Refresher::new(store.clone(), config_path, credentials)
            .with_call_timeout(Duration::from_secs(2));
        tokio::spawn(RefreshLoop::new(refresher, queue).run(shutdown.subscribe()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(store.clone());
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            server.run(listener, server_shutdown).await.unwrap();
        });

        Self {
            addr,
            store,
            commands,
            shutdown,
        }
    }

    /// Start and wait until the first reload has published `path`.
    pub async fn start_loaded(config_path: &Path, path: &str) -> Self {
        let service = Self::start(config_path, CredentialSource::default()).await;
        service.reload().await;
        let store = service.store.clone();
        let path = path.to_string();
        wait_until(move || store.get(&path).is_some()).await;
        service
    }

    pub async fn reload(&self) {
        self.commands.send(RefreshCommand::Reload).await.unwrap();
    }

    /// Wait until every command sent so far has finished executing.
    ///
    /// The loop runs one command at a time, so once a trailing marker has
    /// been taken off the queue everything before it is done.
    pub async fn settle(&self) {
        self.commands.send(RefreshCommand::Recompute).await.unwrap();
        let commands = self.commands.clone();
        wait_until(move || commands.capacity() == commands.max_capacity()).await;
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Poll `check` until it holds, failing after five seconds.
pub async fn wait_until<F>(check: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Run `f` concurrently `n` times and collect the results.
pub async fn concurrently<F, Fut, T>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = (0..n).map(|i| tokio::spawn(f(i))).collect();
    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}
