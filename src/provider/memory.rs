//! In-memory DNS backend.
//!
//! Zones and records are declared inline under `provider.metadata.zones`,
//! which makes it possible to run the adapter without cloud credentials:
//!
//! ```yaml
//! provider:
//!   type: static
//!   metadata:
//!     zones:
//!       - name: example.com.
//!         records:
//!           - {name: web-1.example.com., type: A, ttl: 300, data: [10.0.0.1]}
//! ```

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::provider::{DnsProvider, ProviderError, ProviderResult, Record, RecordFilter, Zone};

pub const PROVIDER_NAME: &str = "static";

#[derive(Debug, Deserialize)]
struct ZoneSpec {
    name: String,
    #[serde(default)]
    records: Vec<RecordSpec>,
}

#[derive(Debug, Deserialize)]
struct RecordSpec {
    name: String,
    #[serde(rename = "type", default = "default_type")]
    record_type: String,
    #[serde(default)]
    ttl: i64,
    #[serde(default)]
    data: Vec<String>,
}

fn default_type() -> String {
    "A".to_string()
}

/// Provider serving a fixed zone set.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    zones: Vec<(Zone, Vec<Record>)>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone; its id is its position in the provider.
    pub fn with_zone(mut self, name: &str, records: Vec<Record>) -> Self {
        let zone = Zone {
            id: format!("static-{}", self.zones.len()),
            name: name.trim_end_matches('.').replace('.', "-"),
            zone: name.to_string(),
        };
        self.zones.push((zone, records));
        self
    }

    /// Build from `provider.metadata.zones`. A missing key yields an empty provider.
    pub fn from_config(config: &Config) -> ProviderResult<Self> {
        let specs: Vec<ZoneSpec> = match config.provider.metadata.get("zones") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ProviderError::Metadata(format!("provider.metadata.zones: {}", e))
            })?,
            None => Vec::new(),
        };

        let provider = specs.into_iter().fold(Self::new(), |provider, spec| {
            let records = spec
                .records
                .into_iter()
                .map(|r| Record::new(r.name, r.record_type, r.ttl, r.data))
                .collect();
            provider.with_zone(&spec.name, records)
        });

        tracing::debug!(zones = provider.zones.len(), "Static provider built");
        Ok(provider)
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    fn kind(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_zones(&self, _names: &[String]) -> ProviderResult<Vec<Zone>> {
        Ok(self.zones.iter().map(|(zone, _)| zone.clone()).collect())
    }

    async fn list_records(&self, zone: &Zone, filter: &RecordFilter) -> ProviderResult<Vec<Record>> {
        let records = self
            .zones
            .iter()
            .find(|(z, _)| z.id == zone.id)
            .map(|(_, records)| records.clone())
            .unwrap_or_default();
        Ok(filter.retain(records))
    }
}
