//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): proxied cycles by status
//! - `proxy_backend_dials_total` (counter): fresh backend connections
//! - `proxy_pool_reused_total` (counter): acquires served from the pool
//! - `proxy_pool_discarded_total` (counter): releases that closed the connection
//! - `proxy_bytes_tallied_total` (counter): bytes added to the stats ledger
//!
//! Without an installed recorder every call here is a no-op, so tests and
//! runs with metrics disabled pay nothing.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16) {
    counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_backend_dial() {
    counter!("proxy_backend_dials_total").increment(1);
}

pub fn record_pool_reuse() {
    counter!("proxy_pool_reused_total").increment(1);
}

pub fn record_pool_discard() {
    counter!("proxy_pool_discarded_total").increment(1);
}

pub fn record_bytes_tallied(bytes: u64) {
    counter!("proxy_bytes_tallied_total").increment(bytes);
}
