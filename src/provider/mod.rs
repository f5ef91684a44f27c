//! DNS provider subsystem.
//!
//! # Data Flow
//! ```text
//! Config.provider (type + metadata) + CredentialSource
//!     → connect() picks the backend by type
//!         - yandex.rs (Yandex Cloud DNS REST API)
//!         - memory.rs (zones declared inline in the config)
//!     → Arc<dyn DnsProvider>
//!
//! Refresh cycle:
//!     list_zones() → [Zone]
//!     list_records(zone, RecordFilter) → [Record] matching any filter
//! ```
//!
//! # Design Decisions
//! - The refresh engine only sees the `DnsProvider` trait
//! - Zones and records are plain values, no backend handles leak out
//! - Record filtering lives in `RecordFilter` so every backend matches the same way

pub mod credentials;
pub mod memory;
pub mod yandex;

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::config::Config;

pub use credentials::CredentialSource;
pub use memory::MemoryProvider;
pub use yandex::YandexProvider;

/// Errors raised while building or querying a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Required metadata is absent or has the wrong type.
    #[error("incorrect provider definition: {0}")]
    Metadata(String),

    /// Credentials could not be read or exchanged for a token.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Transport failure talking to the backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A rule filter is not a valid regular expression.
    #[error("invalid filter: {0}")]
    Filter(#[from] regex::Error),

    /// A provider call exceeded its deadline.
    #[error("provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No backend is registered under the configured type.
    #[error("unsupported provider type {0:?}")]
    UnsupportedProvider(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A DNS zone exposed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Backend identifier used to address the zone.
    pub id: String,
    /// Human-readable zone resource name.
    pub name: String,
    /// DNS suffix served by the zone (e.g., "example.com.").
    pub zone: String,
}

/// A DNS resource record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    name: String,
    record_type: String,
    ttl: i64,
    data: Vec<String>,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: i64,
        data: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            ttl,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn data(&self) -> &[String] {
        &self.data
    }
}

/// Compiled set of record name patterns with OR semantics.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    patterns: Vec<Regex>,
}

impl RecordFilter {
    /// Compile every pattern, failing on the first invalid one.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> ProviderResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True when any pattern matches, checked in declaration order.
    ///
    /// An empty filter matches nothing.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }

    /// Keep only the records whose name matches, preserving order.
    pub fn retain(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().filter(|r| self.matches(r.name())).collect()
    }
}

/// Capability set every DNS backend implements.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Backend type this provider was built for.
    fn kind(&self) -> &'static str;

    /// List zones visible to the client's credentials.
    ///
    /// `names` narrows the set in a backend-defined way; current backends
    /// accept it and return every zone in scope.
    async fn list_zones(&self, names: &[String]) -> ProviderResult<Vec<Zone>>;

    /// List records in `zone` whose name matches `filter`, in backend order.
    async fn list_records(&self, zone: &Zone, filter: &RecordFilter) -> ProviderResult<Vec<Record>>;
}

/// Build a provider client for the backend named by `config.provider.type`.
///
/// No network calls are made here; credentials are resolved lazily.
pub fn connect(
    config: &Config,
    credentials: &CredentialSource,
    http: reqwest::Client,
) -> ProviderResult<Arc<dyn DnsProvider>> {
    match config.provider.kind.as_str() {
        yandex::PROVIDER_NAME => Ok(Arc::new(YandexProvider::new(config, credentials, http)?)),
        memory::PROVIDER_NAME => Ok(Arc::new(MemoryProvider::from_config(config)?)),
        other => Err(ProviderError::UnsupportedProvider(other.to_string())),
    }
}
