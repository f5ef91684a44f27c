//! Command-line and environment settings.
//!
//! Every flag can also be set through the environment variable listed in
//! `--help`; flags win over the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::observability::logging::LogFormat;
use crate::provider::CredentialSource;

#[derive(Debug, Parser)]
#[command(name = "dns-http-sd")]
#[command(about = "Prometheus HTTP service discovery backed by DNS records", long_about = None)]
pub struct Args {
    /// Path to the YAML (or TOML) configuration file.
    #[arg(long, env = "DNS_HTTP_SD_CONFIG")]
    pub config_path: PathBuf,

    /// Service account authorized key file for Yandex Cloud.
    #[arg(long, env = "YC_AUTH_JSON_FILE_PATH")]
    pub yc_auth_json_file_path: Option<PathBuf>,

    /// Pre-issued Yandex Cloud IAM token.
    #[arg(long, env = "YC_IAM_TOKEN", hide_env_values = true)]
    pub yc_iam_token: Option<String>,

    /// Interval between document refreshes.
    #[arg(long, env = "DATA_UPDATE_INTERVAL", default_value = "1h", value_parser = parse_nonzero_duration)]
    pub data_update_interval: Duration,

    /// Address the HTTP surface listens on.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen_address: SocketAddr,

    /// Deadline for a single provider call.
    #[arg(long, default_value = "30s", value_parser = parse_nonzero_duration)]
    pub provider_timeout: Duration,

    /// Address for the Prometheus metrics exporter; disabled when unset.
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,

    /// Log output format: pretty or json.
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse a humantime duration that must be greater than zero.
fn parse_nonzero_duration(raw: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(raw).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

impl Args {
    /// Credential source for the provider client.
    ///
    /// A key file takes precedence over a static token; with neither, the
    /// instance service account is used.
    pub fn credential_source(&self) -> CredentialSource {
        if let Some(path) = &self.yc_auth_json_file_path {
            return CredentialSource::ServiceAccountKey(path.clone());
        }
        match &self.yc_iam_token {
            Some(token) if !token.is_empty() => CredentialSource::IamToken(token.clone()),
            _ => CredentialSource::InstanceServiceAccount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("dns-http-sd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--config-path", "/etc/sd.yaml"]);
        assert_eq!(args.config_path, PathBuf::from("/etc/sd.yaml"));
        assert_eq!(args.data_update_interval, Duration::from_secs(3600));
        assert_eq!(args.listen_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.provider_timeout, Duration::from_secs(30));
        assert_eq!(args.log_format, LogFormat::Pretty);
        assert!(args.metrics_address.is_none());
    }

    #[test]
    fn test_interval_and_format() {
        let args = parse(&[
            "--config-path",
            "sd.yaml",
            "--data-update-interval",
            "5m",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.data_update_interval, Duration::from_secs(300));
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let result = Args::try_parse_from(["dns-http-sd", "--config-path", "a", "--data-update-interval", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        for flag in ["--data-update-interval", "--provider-timeout"] {
            for raw in ["0s", "0ms"] {
                let result = Args::try_parse_from(["dns-http-sd", "--config-path", "a", flag, raw]);
                assert!(result.is_err(), "{} {} accepted", flag, raw);
            }
        }
    }

    #[test]
    fn test_credential_precedence() {
        let args = parse(&["--config-path", "a", "--yc-iam-token", "t1", "--yc-auth-json-file-path", "/key.json"]);
        assert!(matches!(args.credential_source(), CredentialSource::ServiceAccountKey(p) if p == PathBuf::from("/key.json")));

        let args = parse(&["--config-path", "a", "--yc-iam-token", "t1"]);
        assert!(matches!(args.credential_source(), CredentialSource::IamToken(t) if t == "t1"));

        let args = parse(&["--config-path", "a"]);
        assert!(matches!(args.credential_source(), CredentialSource::InstanceServiceAccount));
    }
}
