//! `/reports/*` routes (spec §6.1): listing/filtering stored reports,
//! fetching one by id, and admin-gated deletion.

use axum::extract::{Path, Query, State};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use vigil_core::model::RiskLevel;
use vigil_core::traits::ReportFilter;

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::RouteTier;
use crate::state::AppState;

/// Takes a concrete `state` (rather than being generic over it, like
/// [`crate::routes::agent::routes`]) so the admin-only delete route can be
/// layered with [`require_admin`] here, mirroring how the teacher's
/// `ApiServer::build_router` layers `auth_context_middleware` with the live
/// config already in hand (`dashflow-registry/src/api/server.rs`).
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports))
        .route("/:report_id", get(get_report))
        .route(
            "/:report_id",
            delete(delete_report)
                .route_layer(middleware::from_fn_with_state(state, require_admin)),
        )
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub inn: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub date_to: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub min_risk_score: Option<u8>,
    #[serde(default)]
    pub max_risk_score: Option<u8>,
}

fn default_limit() -> u32 {
    50
}

async fn list_reports(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    let filter = ReportFilter {
        inn: query.inn,
        risk_level: query.risk_level,
        client_name: query.client_name,
        date_from: query.date_from,
        date_to: query.date_to,
        min_risk_score: query.min_risk_score,
        max_risk_score: query.max_risk_score,
    };

    let reports = state
        .deps
        .repository
        .list_reports(&filter, query.limit, query.offset)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    Ok(Json(reports))
}

async fn get_report(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(report_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    let report = state
        .deps
        .repository
        .get_report(&report_id)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?
        .ok_or_else(|| ApiError::not_found(format!("no report with id {report_id}")))?;

    Ok(Json(report))
}

#[derive(Debug, serde::Serialize)]
struct DeleteResponse {
    report_id: String,
    deleted: bool,
}

async fn delete_report(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(report_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.enforce(&headers, RouteTier::Frequent)?;

    let deleted = state
        .deps
        .repository
        .delete_report(&report_id)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    if deleted {
        Ok(Json(DeleteResponse { report_id, deleted }))
    } else {
        Err(ApiError::not_found(format!("no report with id {report_id}")))
    }
}
