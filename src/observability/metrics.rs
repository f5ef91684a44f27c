//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sd_refresh_total` (counter): refresh runs by kind and outcome
//! - `sd_refresh_duration_seconds` (histogram): refresh latency by kind
//! - `sd_provider_errors_total` (counter): failed provider operations
//! - `sd_targets` (gauge): targets currently published per path
//! - `sd_http_requests_total` (counter): served requests by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_refresh(kind: &'static str, success: bool, started: Instant) {
    let outcome = if success { "success" } else { "failure" };
    counter!("sd_refresh_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("sd_refresh_duration_seconds", "kind" => kind)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_provider_error(operation: &'static str) {
    counter!("sd_provider_errors_total", "operation" => operation).increment(1);
}

pub fn set_targets(path: &str, count: usize) {
    gauge!("sd_targets", "path" => path.to_string()).set(count as f64);
}

pub fn record_request(status: u16) {
    counter!("sd_http_requests_total", "status" => status.to_string()).increment(1);
}
