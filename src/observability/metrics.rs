//! # Metrics
//!
//! Prometheus metrics for monitoring reconciliations.
//!
//! ## Metrics Exposed
//!
//! - `ief_reconciliations_total{resource,operation}` - Reconciliation calls
//! - `ief_reconciliation_errors_total{resource,kind}` - Failed reconciliations by error kind
//! - `ief_drift_detected_total{resource}` - Resources dropped from state because of drift
//! - `ief_legacy_state_remediations_total` - Persisted secrets removed from legacy state
//! - `ief_uploads_skipped_total` - Uploads skipped because the version marker was unchanged
//! - `ief_graph_requests_total{operation,status}` - Graph API requests by response status
//! - `ief_graph_request_duration_seconds{operation}` - Graph API request latency

use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("ief_reconciliations_total", "Total number of reconciliations"),
        &["resource", "operation"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ief_reconciliation_errors_total",
            "Total number of failed reconciliations by error kind",
        ),
        &["resource", "kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static DRIFT_DETECTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ief_drift_detected_total",
            "Total number of resources removed from state because of drift",
        ),
        &["resource"],
    )
    .expect("Failed to create DRIFT_DETECTED_TOTAL metric - this should never happen")
});

static LEGACY_STATE_REMEDIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ief_legacy_state_remediations_total",
        "Total number of persisted secret values removed from legacy state",
    )
    .expect("Failed to create LEGACY_STATE_REMEDIATIONS_TOTAL metric - this should never happen")
});

static UPLOADS_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ief_uploads_skipped_total",
        "Total number of secret uploads skipped because value_version was unchanged",
    )
    .expect("Failed to create UPLOADS_SKIPPED_TOTAL metric - this should never happen")
});

static GRAPH_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ief_graph_requests_total",
            "Total number of Graph API requests by operation and response status",
        ),
        &["operation", "status"],
    )
    .expect("Failed to create GRAPH_REQUESTS_TOTAL metric - this should never happen")
});

static GRAPH_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ief_graph_request_duration_seconds",
            "Duration of Graph API requests in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create GRAPH_REQUEST_DURATION metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all metrics with the process registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DRIFT_DETECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LEGACY_STATE_REMEDIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPLOADS_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GRAPH_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GRAPH_REQUEST_DURATION.clone()))?;

    Ok(())
}

/// Render the registry in the Prometheus text exposition format
///
/// # Errors
/// Returns an error if encoding fails
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

pub fn increment_reconciliations(resource: &str, operation: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[resource, operation])
        .inc();
}

pub fn increment_reconciliation_errors(resource: &str, kind: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[resource, kind])
        .inc();
}

pub fn increment_drift_detected(resource: &str) {
    DRIFT_DETECTED_TOTAL.with_label_values(&[resource]).inc();
}

pub fn increment_legacy_state_remediations() {
    LEGACY_STATE_REMEDIATIONS_TOTAL.inc();
}

pub fn increment_uploads_skipped() {
    UPLOADS_SKIPPED_TOTAL.inc();
}

pub fn record_graph_request(operation: &str, status: &str, duration: f64) {
    GRAPH_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    GRAPH_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}
