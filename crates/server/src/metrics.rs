//! Prometheus metrics for the depot server.
//!
//! The `/metrics` endpoint is unauthenticated. Restrict it to the scraper at
//! the network level, or disable it with `server.metrics_enabled = false`.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use depot_mirror::{JobOutcome, OutcomeObserver};
use prometheus::{self, Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{Arc, LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static MIRROR_RESPONSES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "depot_mirror_responses_total",
            "Successful mirror protocol responses by operation and source",
        ),
        &["operation", "source"],
    )
    .expect("metric creation failed")
});

pub static COPIER_QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "depot_copier_queue_depth",
        "Copy jobs waiting for a worker",
    )
    .expect("metric creation failed")
});

pub static COPIER_JOBS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("depot_copier_jobs_total", "Copy jobs by terminal outcome"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(MIRROR_RESPONSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COPIER_QUEUE_DEPTH.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COPIER_JOBS.clone()))
            .expect("metric registration failed");
    });
}

/// Count a served mirror response.
pub fn record_mirror_response(operation: &str, mirror_source: bool) {
    let source = if mirror_source { "mirror" } else { "upstream" };
    MIRROR_RESPONSES
        .with_label_values(&[operation, source])
        .inc();
}

/// Copier observer feeding `depot_copier_jobs_total`.
pub fn copier_observer() -> OutcomeObserver {
    Arc::new(|outcome: JobOutcome| {
        COPIER_JOBS.with_label_values(&[outcome.as_str()]).inc();
    })
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    COPIER_QUEUE_DEPTH.set(state.mirror.copier().queue_depth() as i64);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
