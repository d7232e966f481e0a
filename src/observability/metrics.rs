//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_dispatch_total` (counter): routing decisions by service, matched
//! - `router_requests_total` (counter): proxied requests by method, status, service
//! - `router_request_duration_seconds` (histogram): latency by service
//! - `router_config_reloads_total` (counter): reload attempts by result
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_dispatch(service: &str, matched: bool) {
    ::metrics::counter!(
        "router_dispatch_total",
        "service" => service.to_string(),
        "matched" => if matched { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    ::metrics::counter!(
        "router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        "router_request_duration_seconds",
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_config_reload(success: bool) {
    ::metrics::counter!(
        "router_config_reloads_total",
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}
