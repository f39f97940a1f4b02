//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_fanout_candidates` (histogram): candidates per request
//! - `gateway_backend_requests_total` (counter): backend calls by backend, status
//! - `gateway_backend_latency_seconds` (histogram): backend call latency
//! - `gateway_backend_failures_total` (counter): genuine backend failures
//! - `gateway_filter_rejections_total` (counter): chain stops by filter
//! - `gateway_rate_limited_total` (counter)
//!
//! User cancellations are never recorded as backend failures.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, candidates: usize, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
    metrics::histogram!("gateway_fanout_candidates").record(candidates as f64);
}

pub fn record_backend_call(backend: &str, status: u16, latency: Duration) {
    metrics::counter!(
        "gateway_backend_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_backend_latency_seconds", "backend" => backend.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_backend_failure(backend: &str) {
    metrics::counter!("gateway_backend_failures_total", "backend" => backend.to_string())
        .increment(1);
}

pub fn record_filter_rejection(filter: &'static str) {
    metrics::counter!("gateway_filter_rejections_total", "filter" => filter).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}
