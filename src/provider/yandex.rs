//! Yandex Cloud DNS backend.
//!
//! # Responsibilities
//! - Resolve the folder scope from `provider.metadata.folderIds`
//! - List DNS zones per folder and record sets per zone over the REST API
//! - Follow `nextPageToken` pagination until exhausted
//!
//! # Design Decisions
//! - Zone name arguments are accepted but do not narrow the zone list
//! - Record sets are not deduplicated by (name, type)
//! - `provider.metadata.endpoint` overrides the API base (private installations, tests)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::config::Config;
use crate::provider::credentials::{CredentialSource, Credentials};
use crate::provider::{DnsProvider, ProviderError, ProviderResult, Record, RecordFilter, Zone};

pub const PROVIDER_NAME: &str = "yandex-cloud/yandex";
pub const DNS_ENDPOINT: &str = "https://dns.api.cloud.yandex.net/dns/v1/";

const PAGE_SIZE: &str = "1000";

/// Client for the Yandex Cloud DNS API scoped to a set of folders.
#[derive(Debug)]
pub struct YandexProvider {
    folder_ids: Vec<String>,
    endpoint: Url,
    credentials: Credentials,
    http: reqwest::Client,
}

impl YandexProvider {
    /// Build a client from config metadata and a credential source.
    pub fn new(
        config: &Config,
        credentials: &CredentialSource,
        http: reqwest::Client,
    ) -> ProviderResult<Self> {
        let folder_ids = folder_ids(config)?;
        let endpoint = endpoint(config)?;
        let credentials = Credentials::new(credentials, http.clone())?;

        tracing::info!(
            folders = ?folder_ids,
            endpoint = %endpoint,
            "Yandex Cloud DNS client initialized"
        );

        Ok(Self {
            folder_ids,
            endpoint,
            credentials,
            http,
        })
    }

    pub fn folder_ids(&self) -> &[String] {
        &self.folder_ids
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let token = self.credentials.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> ProviderResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| ProviderError::Metadata(format!("invalid API path {:?}: {}", path, e)))
    }
}

#[async_trait]
impl DnsProvider for YandexProvider {
    fn kind(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_zones(&self, _names: &[String]) -> ProviderResult<Vec<Zone>> {
        let mut zones = Vec::new();

        for folder_id in &self.folder_ids {
            let mut page_token = String::new();
            loop {
                let mut query = vec![("folderId", folder_id.as_str()), ("pageSize", PAGE_SIZE)];
                if !page_token.is_empty() {
                    query.push(("pageToken", page_token.as_str()));
                }

                let page: ListDnsZonesResponse = self.get_page(self.url("zones")?, &query).await?;
                zones.extend(page.dns_zones.into_iter().map(|z| Zone {
                    id: z.id,
                    name: z.name,
                    zone: z.zone,
                }));

                if page.next_page_token.is_empty() {
                    break;
                }
                page_token = page.next_page_token;
            }
            tracing::debug!(folder_id = %folder_id, total = zones.len(), "Listed DNS zones");
        }

        Ok(zones)
    }

    async fn list_records(&self, zone: &Zone, filter: &RecordFilter) -> ProviderResult<Vec<Record>> {
        let url = self.url(&format!("zones/{}:listRecordSets", zone.id))?;
        let mut records = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE)];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.as_str()));
            }

            let page: ListRecordSetsResponse = self.get_page(url.clone(), &query).await?;
            let matched = filter.retain(
                page.record_sets
                    .into_iter()
                    .map(|r| Record::new(r.name, r.record_type, r.ttl, r.data))
                    .collect(),
            );
            records.extend(matched);

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }

        tracing::debug!(zone = %zone.zone, matched = records.len(), "Listed record sets");
        Ok(records)
    }
}

fn folder_ids(config: &Config) -> ProviderResult<Vec<String>> {
    let value = config.provider.metadata.get("folderIds").ok_or_else(|| {
        ProviderError::Metadata("provider.metadata.folderIds field required".to_string())
    })?;

    let items = value.as_array().ok_or_else(|| {
        ProviderError::Metadata("incorrect provider.metadata.folderIds field type".to_string())
    })?;

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ProviderError::Metadata(
                    "incorrect provider.metadata.folderIds field type".to_string(),
                )
            })
        })
        .collect()
}

fn endpoint(config: &Config) -> ProviderResult<Url> {
    let raw = match config.provider.metadata.get("endpoint") {
        Some(value) => value.as_str().ok_or_else(|| {
            ProviderError::Metadata("provider.metadata.endpoint must be a string".to_string())
        })?,
        None => DNS_ENDPOINT,
    };

    // Url::join drops the last segment unless the base ends with '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    Url::parse(&normalized)
        .map_err(|e| ProviderError::Metadata(format!("invalid provider.metadata.endpoint: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDnsZonesResponse {
    #[serde(default)]
    dns_zones: Vec<DnsZone>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct DnsZone {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    zone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRecordSetsResponse {
    #[serde(default)]
    record_sets: Vec<RecordSet>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct RecordSet {
    name: String,
    #[serde(rename = "type", default)]
    record_type: String,
    #[serde(default, deserialize_with = "int64")]
    ttl: i64,
    #[serde(default)]
    data: Vec<String>,
}

/// Proto3 JSON encodes int64 as a string; accept both forms.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
