//! REST surface for the counterparty risk analysis engine (spec §6).
//!
//! Mirrors the teacher's `dashflow-registry::api` module layout: one router
//! per resource under [`routes`], wired together and layered with
//! request-id/tracing/body-limit middleware by [`build_router`], the
//! equivalent of the teacher's `ApiServer::build_router`
//! (`dashflow-registry/src/api/server.rs`).

pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod sse;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Request bodies above this size are rejected with 413 before JSON parsing
/// ever runs. `tower_http`'s `limit` feature (the teacher's
/// `RequestBodyLimitLayer`) isn't enabled in this workspace, so
/// `DefaultBodyLimit` — axum's own equivalent — is used instead (see
/// DESIGN.md).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Assembles the full `/api/v1` router: one nested sub-router per resource,
/// a shared [`AppState`], and the teacher's middleware layering order
/// (tracing outermost, then CORS, then the body limit).
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/agent", routes::agent::routes())
        .nest("/reports", routes::reports::routes(state.clone()))
        .nest("/utility", routes::utility::routes(state.clone()))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
