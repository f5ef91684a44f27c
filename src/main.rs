//! DNS HTTP service discovery daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──watch──┐
//!   interval timer ──────┼──▶ refresh queue ──▶ RefreshLoop ──▶ DnsProvider (Yandex Cloud / static)
//!   SIGHUP ──────────────┘                          │
//!                                                   ▼
//!                                            DocumentStore (atomic snapshot)
//!                                                   │
//!   Prometheus ──GET /<path>──▶ HttpServer ─────────┘
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dns_http_sd::cli::Args;
use dns_http_sd::config::watcher::ConfigWatcher;
use dns_http_sd::discovery::{triggers, DocumentStore, RefreshLoop, Refresher};
use dns_http_sd::http::HttpServer;
use dns_http_sd::lifecycle::{signals, Shutdown};
use dns_http_sd::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_logging(args.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config_path,
        interval = ?args.data_update_interval,
        "dns-http-sd starting"
    );

    if let Some(addr) = args.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, address = %addr, "Failed to start metrics exporter");
        }
    }

    let shutdown = Shutdown::new();
    let store = Arc::new(DocumentStore::new());
    let (commands, queue) = triggers::queue();

    let http = reqwest::Client::builder()
        .user_agent(concat!("dns-http-sd/", env!("CARGO_PKG_VERSION")))
        .timeout(args.provider_timeout)
        .build()?;
    let refresher = Refresher::new(store.clone(), &args.config_path, args.credential_source())
        .with_call_timeout(args.provider_timeout)
        .with_http_client(http);

    let refresh_loop = tokio::spawn(RefreshLoop::new(refresher, queue).run(shutdown.subscribe()));
    tokio::spawn(triggers::run_ticker(
        args.data_update_interval,
        commands.clone(),
        shutdown.subscribe(),
    ));
    tokio::spawn(triggers::run_reload_signal(commands.clone(), shutdown.subscribe()));
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    // The watcher stops when its handle is dropped.
    let _watcher = match ConfigWatcher::new(&args.config_path, commands).run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to watch config file, relying on timer and SIGHUP");
            None
        }
    };

    let listener = TcpListener::bind(args.listen_address).await?;
    HttpServer::new(store).run(listener, shutdown.subscribe()).await?;

    if let Err(e) = refresh_loop.await {
        tracing::error!(error = %e, "Refresh loop terminated abnormally");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
