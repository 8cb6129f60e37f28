//! `/utility/*` routes (spec §6.1): liveness/readiness, Prometheus metrics,
//! circuit breaker inspection/reset, and storage stats. Metrics encoding is
//! grounded in the teacher's `dashflow-prometheus-exporter::metrics_handler`
//! (`TextEncoder` over an explicit `Registry`); health is grounded in
//! `dashflow-registry::api::routes::health`.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::RouteTier;
use crate::state::AppState;
use vigil_core::traits::Healthcheck;

/// Takes a concrete `state` for the same reason [`crate::routes::reports::routes`]
/// does: the reset route is admin-only.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/circuit-breakers", get(circuit_breakers))
        .route(
            "/circuit-breakers/:service/reset",
            post(reset_circuit_breaker)
                .route_layer(middleware::from_fn_with_state(state, require_admin)),
        )
        .route("/stats/storage", get(storage_stats))
}

#[derive(Debug, Deserialize)]
struct HealthQuery {
    #[serde(default)]
    deep: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    storage_backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<Vec<DependencyHealth>>,
}

#[derive(Debug, Serialize)]
struct DependencyHealth {
    name: String,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `deep=false` (default) is a liveness probe: the process is up. `deep=true`
/// is a readiness probe that issues a minimal real request against every
/// configured dependency (spec §6.1), mirroring the teacher's split between
/// `/health` and `/ready` (`dashflow-registry::api::routes::health`).
async fn health(State(state): State<AppState>, Query(query): Query<HealthQuery>) -> impl IntoResponse {
    let storage_backend = if state.deps.repository.is_fallback() { "in_memory" } else { "primary" };

    if !query.deep {
        return (
            StatusCode::OK,
            Json(HealthResponse { status: "ok", storage_backend, dependencies: None }),
        );
    }

    let timeout = Duration::from_secs(5);
    let mut dependencies = Vec::new();
    let mut all_healthy = true;

    let registry_result = state.deps.registry.healthcheck(timeout).await;
    all_healthy &= registry_result.is_ok();
    dependencies.push(dependency_result(state.deps.registry.name(), registry_result));

    let court_result = state.deps.court.healthcheck(timeout).await;
    all_healthy &= court_result.is_ok();
    dependencies.push(dependency_result(state.deps.court.name(), court_result));

    let analytics_result = state.deps.analytics.healthcheck(timeout).await;
    all_healthy &= analytics_result.is_ok();
    dependencies.push(dependency_result(state.deps.analytics.name(), analytics_result));

    for client in &state.deps.search_clients {
        let result = client.healthcheck(timeout).await;
        all_healthy &= result.is_ok();
        dependencies.push(dependency_result(client.name(), result));
    }

    let status = if all_healthy { "ok" } else { "degraded" };
    let http_status = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        http_status,
        Json(HealthResponse { status, storage_backend, dependencies: Some(dependencies) }),
    )
}

fn dependency_result(name: &str, result: vigil_core::Result<()>) -> DependencyHealth {
    match result {
        Ok(()) => DependencyHealth { name: name.to_string(), healthy: true, error: None },
        Err(e) => DependencyHealth { name: name.to_string(), healthy: false, error: Some(e.to_string()) },
    }
}

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", METRICS_CONTENT_TYPE)],
            String::from("# failed to encode metrics\n"),
        );
    }

    let body = String::from_utf8(buffer).unwrap_or_else(|_| String::from("# metrics output was not valid utf-8\n"));
    (StatusCode::OK, [("content-type", METRICS_CONTENT_TYPE)], body)
}

#[derive(Debug, Serialize)]
struct CircuitBreakerEntry {
    host: String,
    state: vigil_core::model::CircuitState,
}

async fn circuit_breakers(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.enforce(&headers, RouteTier::Frequent)?;

    let snapshot = state
        .http
        .circuit_snapshot()
        .into_iter()
        .map(|(host, circuit_state)| CircuitBreakerEntry { host, state: circuit_state })
        .collect::<Vec<_>>();

    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    service: String,
    reset: bool,
}

async fn reset_circuit_breaker(State(state): State<AppState>, Path(service): Path<String>) -> impl IntoResponse {
    state.http.reset_circuit(&service);
    Json(ResetResponse { service, reset: true })
}

async fn storage_stats(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.enforce(&headers, RouteTier::Frequent)?;

    let stats = state
        .deps
        .repository
        .get_stats()
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    Ok(Json(stats))
}
