//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_config_reloads_total` (counter): install attempts by outcome
//! - `gateway_active_listeners` (gauge): listeners currently serving
//!
//! Recording is a no-op until a recorder is installed, so the data plane can
//! call these unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_counter!("gateway_requests_total", "Requests served by the data plane");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "End-to-end request latency in seconds"
    );
    describe_counter!(
        "gateway_config_reloads_total",
        "Configuration install attempts by outcome"
    );
    describe_gauge!("gateway_active_listeners", "Listeners currently serving");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one served request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let status = status.to_string();
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status,
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one configuration install attempt. `outcome` is `success` or the
/// stage that refused it.
pub fn record_reload(outcome: &'static str) {
    ::metrics::counter!("gateway_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_active_listeners(count: usize) {
    ::metrics::gauge!("gateway_active_listeners").set(count as f64);
}
