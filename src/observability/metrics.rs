//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_admitted_total` (counter): admitted requests by route class
//! - `guard_requests_rejected_total` (counter): rejections by route class and reason
//! - `guard_auth_failures_total` (counter): observed 401/403 responses on admin routes
//! - `guard_bans_total` (counter): brute-force bans issued
//! - `guard_sweep_evictions_total` (counter): entries reclaimed by cleanup
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations behind the `metrics` macros)
//! - Route class and rejection reason as labels, never raw client keys
//!   (unbounded label cardinality would be its own memory leak)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
///
/// Failure to bind is logged and ignored: the guard keeps serving without
/// an exporter rather than refusing to start.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record an admitted request for a route class.
pub fn record_admitted(route_class: &'static str) {
    metrics::counter!("guard_requests_admitted_total", "class" => route_class).increment(1);
}

/// Record a rejected request with its reason ("rate_limit" or "banned").
pub fn record_rejected(route_class: &'static str, reason: &'static str) {
    metrics::counter!(
        "guard_requests_rejected_total",
        "class" => route_class,
        "reason" => reason
    )
    .increment(1);
}

/// Record an authentication failure observed on an admin route.
pub fn record_auth_failure() {
    metrics::counter!("guard_auth_failures_total").increment(1);
}

/// Record a brute-force ban being armed.
pub fn record_ban() {
    metrics::counter!("guard_bans_total").increment(1);
}

/// Record entries reclaimed by one cleanup pass.
pub fn record_sweep(limiters_removed: usize, bans_removed: usize) {
    metrics::counter!("guard_sweep_evictions_total", "kind" => "limiter")
        .increment(limiters_removed as u64);
    metrics::counter!("guard_sweep_evictions_total", "kind" => "ban")
        .increment(bans_removed as u64);
}
