//! HTTP SD wire types.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One Prometheus HTTP SD target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdConfig {
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Published documents keyed by HTTP path.
pub type DocumentSet = HashMap<String, Vec<SdConfig>>;

/// Format a scrape target for a record name and rule port.
pub fn target(record_name: &str, port: u16) -> String {
    format!("{}:{}", record_name, port)
}
