//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, decision
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_link_resolutions_total` (counter): link calls by outcome
//! - `gateway_stream_aborts_total` (counter): interrupted transfers by side
//! - `gateway_streamed_bytes_total` (counter): body bytes relayed
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request decision.
pub fn record_request(method: &str, status: u16, decision: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "decision" => decision
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "decision" => decision)
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of a link resolution (`ok`, `upstream_error`, `transport_error`).
pub fn record_link_resolution(outcome: &'static str) {
    counter!("gateway_link_resolutions_total", "outcome" => outcome).increment(1);
}

/// Record a transfer interrupted by `side` (`caller` or `upstream`).
pub fn record_stream_abort(side: &'static str) {
    counter!("gateway_stream_aborts_total", "side" => side).increment(1);
}

pub fn record_streamed_bytes(bytes: u64) {
    counter!("gateway_streamed_bytes_total").increment(bytes);
}
