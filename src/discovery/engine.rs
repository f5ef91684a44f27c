//! Refresh engine: reconfiguration and document recomputation.
//!
//! # Responsibilities
//! - Load the config file and build a provider client from it
//! - Walk rules × zones, list matching records, build target groups
//! - Publish results to the document store in one swap
//!
//! # Design Decisions
//! - Reconfiguration failures leave the previous snapshot serving
//! - Provider failures degrade the cycle (skip the zone or rule), never abort it
//! - Every provider call carries its own deadline

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{load_config, Config, ConfigError};
use crate::discovery::document::{target, DocumentSet, SdConfig};
use crate::discovery::store::{DocumentStore, Snapshot};
use crate::observability::metrics;
use crate::provider::{self, CredentialSource, DnsProvider, ProviderError, ProviderResult, RecordFilter};

/// Default deadline for a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that abort a reconfiguration.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to get config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize client: {0}")]
    Client(#[from] ProviderError),
}

/// Owns the inputs needed to rebuild discovery state.
pub struct Refresher {
    store: Arc<DocumentStore>,
    config_path: PathBuf,
    credentials: CredentialSource,
    http: reqwest::Client,
    call_timeout: Duration,
}

impl Refresher {
    pub fn new(
        store: Arc<DocumentStore>,
        config_path: impl Into<PathBuf>,
        credentials: CredentialSource,
    ) -> Self {
        Self {
            store,
            config_path: config_path.into(),
            credentials,
            http: reqwest::Client::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the per-call provider deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client for provider traffic.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reload the config file and rebuild the provider client.
    ///
    /// On success the new config and client replace the old ones while the
    /// published documents stay as they are until the next recompute.
    pub async fn reconfigure(&self) -> Result<(), RefreshError> {
        let started = Instant::now();
        let result = self.build_client();
        metrics::record_refresh("reconfigure", result.is_ok(), started);

        let (config, provider) = result?;
        tracing::info!(
            path = ?self.config_path,
            provider = provider.kind(),
            zones = config.zones.len(),
            rules = config.rules.len(),
            paths = ?config.paths(),
            "Configuration loaded"
        );

        self.store.update(|current| Snapshot {
            config: Some(config),
            provider: Some(provider),
            documents: current.documents.clone(),
        });
        Ok(())
    }

    fn build_client(&self) -> Result<(Arc<Config>, Arc<dyn DnsProvider>), RefreshError> {
        let config = load_config(&self.config_path)?;
        let provider = provider::connect(&config, &self.credentials, self.http.clone())?;
        Ok((Arc::new(config), provider))
    }

    /// Recompute documents from the current config and client and publish them.
    ///
    /// Returns the number of published paths, or `None` when nothing has
    /// been configured yet.
    pub async fn recompute(&self) -> Option<usize> {
        let snapshot = self.store.snapshot();
        let (Some(config), Some(provider)) = (snapshot.config.clone(), snapshot.provider.clone())
        else {
            tracing::warn!("No configuration loaded yet, skipping document refresh");
            return None;
        };

        let started = Instant::now();
        let documents = build_documents(&config, provider.as_ref(), self.call_timeout).await;
        metrics::record_refresh("recompute", true, started);
        for (path, groups) in &documents {
            metrics::set_targets(path, groups.iter().map(|g| g.targets.len()).sum());
        }
        for path in removed_paths(&snapshot.documents, &documents) {
            metrics::set_targets(path, 0);
        }

        let paths = documents.len();
        self.store.publish(Some(config), Some(provider), documents);
        tracing::info!(
            count = paths,
            paths = ?self.store.paths(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Discovery documents published"
        );
        Some(paths)
    }
}

/// Paths published in `previous` that `next` no longer has, sorted.
fn removed_paths<'a>(previous: &'a DocumentSet, next: &DocumentSet) -> Vec<&'a str> {
    let mut removed: Vec<&str> = previous
        .keys()
        .filter(|path| !next.contains_key(*path))
        .map(String::as_str)
        .collect();
    removed.sort_unstable();
    removed
}

async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

/// Build the document set for one refresh cycle.
///
/// Rules are processed in declaration order and zones in provider order;
/// every (rule, zone) pair whose listing succeeds yields one target group,
/// even when no record matched.
pub async fn build_documents(
    config: &Config,
    provider: &dyn DnsProvider,
    call_timeout: Duration,
) -> DocumentSet {
    let zones = match with_deadline(call_timeout, provider.list_zones(&config.zones)).await {
        Ok(zones) => zones,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list zones");
            metrics::record_provider_error("list_zones");
            Vec::new()
        }
    };

    let mut documents = DocumentSet::new();
    for rule in &config.rules {
        let groups = documents.entry(rule.path.clone()).or_default();

        let filter = match RecordFilter::compile(&rule.filters) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::error!(path = %rule.path, error = %e, "Failed to compile rule filters");
                metrics::record_provider_error("compile_filter");
                continue;
            }
        };

        for zone in &zones {
            let records = match with_deadline(call_timeout, provider.list_records(zone, &filter)).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(zone = %zone.zone, path = %rule.path, error = %e, "Failed to list records");
                    metrics::record_provider_error("list_records");
                    continue;
                }
            };

            groups.push(SdConfig {
                targets: records.iter().map(|r| target(r.name(), rule.port)).collect(),
                labels: rule.labels.clone(),
            });
        }
    }

    documents
}
