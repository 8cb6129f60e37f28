//! Prometheus metrics for the HTTP core, scoped per host key the way
//! `dashflow-streaming`'s rate limiter scopes per tenant.

use std::sync::LazyLock;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts};

static REQUEST_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    CounterVec::new(
        Opts::new("vigil_http_requests_total", "Total outbound requests by host and outcome"),
        &["host", "outcome"],
    )
    .expect("metric registration")
});

static REQUEST_LATENCY_MS: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new("vigil_http_request_latency_ms", "Outbound request latency in milliseconds")
            .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]),
        &["host"],
    )
    .expect("metric registration")
});

static RETRY_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    CounterVec::new(
        Opts::new("vigil_http_retries_total", "Total retry attempts by host"),
        &["host"],
    )
    .expect("metric registration")
});

static CIRCUIT_STATE_TRANSITIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    CounterVec::new(
        Opts::new("vigil_http_circuit_transitions_total", "Circuit breaker state transitions by host and new state"),
        &["host", "state"],
    )
    .expect("metric registration")
});

/// Registers every metric in this module with `registry`, for
/// `GET /utility/metrics`. Grounded in the teacher's
/// `dashflow-prometheus-exporter` convention of an explicit `Registry`
/// constructed once at startup rather than the crate-global default
/// registry.
pub fn register(registry: &prometheus::Registry) -> prometheus::Result<()> {
    registry.register(Box::new(REQUEST_TOTAL.clone()))?;
    registry.register(Box::new(REQUEST_LATENCY_MS.clone()))?;
    registry.register(Box::new(RETRY_TOTAL.clone()))?;
    registry.register(Box::new(CIRCUIT_STATE_TRANSITIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_request(host: &str, success: bool, latency_ms: f64) {
    let outcome = if success { "success" } else { "failure" };
    REQUEST_TOTAL.with_label_values(&[host, outcome]).inc();
    REQUEST_LATENCY_MS.with_label_values(&[host]).observe(latency_ms);
}

pub fn record_retry(host: &str) {
    RETRY_TOTAL.with_label_values(&[host]).inc();
}

pub fn record_circuit_transition(host: &str, state: &str) {
    CIRCUIT_STATE_TRANSITIONS_TOTAL.with_label_values(&[host, state]).inc();
}
