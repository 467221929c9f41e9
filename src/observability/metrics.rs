//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connection_inits_total` (counter): by chain, outcome
//! - `gateway_broadcasts_total` (counter): by chain, accepted
//! - `gateway_broadcast_attempts` (histogram): attempts per broadcast
//! - `gateway_polls_total` (counter): by chain, resulting status
//! - `gateway_rpc_health` (gauge): 1=healthy, 0=unhealthy, by chain

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record a connection initialization outcome.
pub fn record_connection_init(chain: &str, success: bool) {
    metrics::counter!(
        "gateway_connection_inits_total",
        "chain" => chain.to_string(),
        "outcome" => if success { "ok" } else { "failed" },
    )
    .increment(1);
}

/// Record a finished broadcast and how many attempts it took.
pub fn record_broadcast(chain: &str, accepted: bool, attempts: u32) {
    metrics::counter!(
        "gateway_broadcasts_total",
        "chain" => chain.to_string(),
        "accepted" => accepted.to_string(),
    )
    .increment(1);
    metrics::histogram!("gateway_broadcast_attempts", "chain" => chain.to_string())
        .record(f64::from(attempts));
}

/// Record a poll and the status it resolved to.
pub fn record_poll(chain: &str, status: &str) {
    metrics::counter!(
        "gateway_polls_total",
        "chain" => chain.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record chain RPC health.
pub fn record_rpc_health(chain: &str, healthy: bool) {
    metrics::gauge!("gateway_rpc_health", "chain" => chain.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
