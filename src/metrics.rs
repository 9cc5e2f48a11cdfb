//! Prometheus metrics exporter, installed once at startup exactly as
//! `metrics.rs::init_metrics` does. This crate has no CPU-profiling endpoint
//! to isolate, so `/metrics` is served on the same router as the rest of the
//! API rather than a separate bind.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle whose `render()`
/// produces the exposition-format text for `/metrics`.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("failed to set buckets for http_request_duration_seconds")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Zero out every counter/gauge this crate emits so they appear in
/// Prometheus queries before the first real event, matching the
/// `initialize_run_metrics` convention.
pub fn initialize_metrics() {
    metrics::counter!("cache_hits_total").absolute(0);
    metrics::counter!("cache_misses_total").absolute(0);
    metrics::counter!("cache_sets_total").absolute(0);
    metrics::counter!("cache_deletes_total").absolute(0);
    metrics::counter!("token_refresh_success_total").absolute(0);
    metrics::counter!("token_refresh_failure_total").absolute(0);
    metrics::counter!("rate_limit_denied_total").absolute(0);
    metrics::counter!("upstream_retry_total").absolute(0);
    metrics::gauge!("sessions_active").set(0.0);
    metrics::gauge!("websocket_connections").set(0.0);
}

pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
