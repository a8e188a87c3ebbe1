//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, upstream
//! - `gateway_request_duration_seconds` (histogram): latency by method, upstream
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//! - `gateway_auth_failures_total` (counter): rejected credentials by code
//! - `gateway_upstream_errors_total` (counter): transport failures by upstream
//! - `gateway_rate_limit_buckets` (gauge): tracked client keys after each sweep
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter runs its own listener on `metrics_address`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "upstream" => upstream.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_auth_failure(code: &'static str) {
    counter!("gateway_auth_failures_total", "code" => code).increment(1);
}

pub fn record_upstream_error(upstream: &str) {
    counter!("gateway_upstream_errors_total", "upstream" => upstream.to_string()).increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("gateway_rate_limit_buckets").set(count as f64);
}
