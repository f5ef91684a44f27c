//! Configuration schema definitions.
//!
//! This module defines the discovery policy: which DNS provider to query,
//! which zones to look at and how matched records are published.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the discovery adapter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// DNS backend selection and its backend-specific settings.
    pub provider: ProviderConfig,

    /// Zone names to query. Empty means every zone visible to the credential.
    #[serde(default)]
    pub zones: Vec<String>,

    /// Publication rules, evaluated in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// DNS provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProviderConfig {
    /// Backend identifier (e.g., "yandex-cloud/yandex").
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque per-backend settings (folder ids, endpoints, static zones).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A rule mapping matched DNS records to an HTTP SD path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    /// HTTP path the rule output is published under.
    pub path: String,

    /// Port appended to every matched record name.
    pub port: u16,

    /// Regular expressions; a record matches when any of them matches its name.
    #[serde(default)]
    pub filters: Vec<String>,

    /// Labels attached to every target group this rule produces.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Config {
    /// Distinct rule paths in declaration order.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !paths.contains(&rule.path.as_str()) {
                paths.push(&rule.path);
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
provider:
  type: yandex-cloud/yandex
  metadata:
    folderIds: [b1g000000000]
zones: []
rules:
  - path: /web
    port: 9100
    filters: ["^web-.*"]
    labels:
      job: node
  - path: /web
    port: 9200
    filters: ["^api-.*"]
"#;

    #[test]
    fn test_deserialize_yaml() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.provider.kind, "yandex-cloud/yandex");
        assert!(config.provider.metadata.contains_key("folderIds"));
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].port, 9100);
        assert_eq!(config.rules[0].labels.get("job").map(String::as_str), Some("node"));
        assert!(config.rules[1].labels.is_empty());
    }

    #[test]
    fn test_optional_sections_default_to_empty() {
        let config: Config = serde_yaml::from_str("provider: {type: static}").unwrap();
        assert!(config.zones.is_empty());
        assert!(config.rules.is_empty());
        assert!(config.provider.metadata.is_empty());
    }

    #[test]
    fn test_paths_are_deduplicated_in_order() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.paths(), vec!["/web"]);
    }

    #[test]
    fn test_port_out_of_range_is_rejected() {
        let raw = "provider: {type: static}\nrules:\n  - path: /x\n    port: 70000\n";
        assert!(serde_yaml::from_str::<Config>(raw).is_err());
    }
}
