//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `secure_lines_total` (counter): lines received over TLS
//! - `secure_connection_errors_total` (counter): failed TLS exchanges
//! - `secure_open_connections` (gauge): current TLS connection count
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new();
    match builder.with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    let status = status.to_string();
    counter!("http_requests_total", "status" => status).increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_line() {
    counter!("secure_lines_total").increment(1);
}

pub fn record_connection_error() {
    counter!("secure_connection_errors_total").increment(1);
}

pub fn set_open_connections(open: u64) {
    gauge!("secure_open_connections").set(open as f64);
}
