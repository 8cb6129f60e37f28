//! `/agent/*` routes (spec §6.1): start/stream analysis, thread history,
//! session cancellation, feedback-driven reruns, and the async queue path.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::model::{AnalysisInputs, AnalysisTask, ClientAnalysisReport, FeedbackRating, Stage, TaskStatus, UserFeedback};
use vigil_core::workflow::{rerun_with_feedback, run_session, EventBus};
use vigil_core::{ErrorPayload, VigilError};

use crate::error::{ApiError, ApiResult};
use crate::rate_limit::RouteTier;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-client", post(analyze_client))
        .route("/analyze-client/async", post(analyze_client_async))
        .route("/threads", get(list_threads))
        .route("/thread_history/:thread_id", get(thread_history))
        .route("/analyze/:session_id", delete(cancel_session))
        .route("/feedback", post(feedback))
        .route("/task/:task_id", get(task_status))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub client_name: String,
    #[serde(default)]
    pub inn: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ClientAnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

async fn analyze_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Response> {
    state.rate_limiter.enforce(&headers, RouteTier::Analyze)?;

    let inputs = AnalysisInputs {
        client_name: request.client_name,
        inn: request.inn,
        notes: request.additional_notes,
    };
    let session_id = Uuid::new_v4().to_string();
    let cancel = state.sessions.register(session_id.clone());

    if query.stream {
        let bus = EventBus::default();
        let receiver = bus.subscribe();
        let sid = session_id.clone();
        let sessions = state.sessions.clone();
        let deps = state.deps.clone();
        let config = state.workflow_config.clone();
        tokio::spawn(async move {
            let _final_state = run_session(sid.clone(), inputs, &deps, &config, &bus, &cancel).await;
            sessions.unregister(&sid);
        });
        Ok(crate::sse::event_stream(receiver).into_response())
    } else {
        let bus = EventBus::default();
        let final_state = run_session(session_id.clone(), inputs, &state.deps, &state.workflow_config, &bus, &cancel).await;
        state.sessions.unregister(&session_id);

        let response = match final_state.stage {
            Stage::Completed => AnalyzeResponse {
                status: "success",
                session_id,
                report: final_state.report,
                error: None,
            },
            _ => AnalyzeResponse {
                status: "failed",
                session_id,
                report: None,
                error: final_state.error,
            },
        };
        Ok(Json(response).into_response())
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub client_name: String,
    pub inn: Option<String>,
    pub stage: Stage,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadListQuery {
    #[serde(default = "default_thread_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_thread_limit() -> u32 {
    50
}

async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ThreadListQuery>,
) -> ApiResult<Json<Vec<ThreadSummary>>> {
    state.rate_limiter.enforce(&headers, RouteTier::ThreadList)?;

    let threads = state
        .deps
        .repository
        .list_threads(query.limit, query.offset)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    Ok(Json(
        threads
            .into_iter()
            .map(|t| ThreadSummary {
                thread_id: t.thread_id,
                client_name: t.client_name,
                inn: t.inn,
                stage: t.thread_data.stage,
                created_at: t.created_at,
                updated_at: t.updated_at,
            })
            .collect(),
    ))
}

async fn thread_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> ApiResult<Response> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    let thread = state
        .deps
        .repository
        .get_thread(&thread_id)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?
        .ok_or_else(|| ApiError::not_found(format!("no thread with id {thread_id}")))?;

    Ok(Json(thread).into_response())
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    session_id: String,
    cancelling: bool,
}

async fn cancel_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    if state.sessions.cancel(&session_id) {
        Ok(Json(CancelResponse { session_id, cancelling: true }))
    } else {
        Err(ApiError::not_found(format!("no running session with id {session_id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub report_id: String,
    pub rating: FeedbackRating,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub rerun_analysis: bool,
}

async fn feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    let report = state
        .deps
        .repository
        .get_report(&request.report_id)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?
        .ok_or_else(|| ApiError::not_found(format!("no report with id {}", request.report_id)))?;

    let thread = find_thread_for_report(&state, &request.report_id, report.inn.as_deref()).await?;

    let user_feedback = UserFeedback {
        rating: request.rating,
        comment: request.comment,
        focus_areas: request.focus_areas,
    };

    if !request.rerun_analysis {
        let mut thread = thread;
        thread.thread_data.user_feedback = Some(user_feedback);
        thread.updated_at = chrono::Utc::now();
        let session_id = thread.thread_id.clone();
        state.deps.repository.save_thread(thread).await.map_err(|e| ApiError::from_vigil(&e, None))?;
        return Ok(Json(AnalyzeResponse { status: "success", session_id, report: Some(report.report_data), error: None }));
    }

    let bus = EventBus::default();
    let thread_id = thread.thread_id.clone();
    let new_state = rerun_with_feedback(thread, user_feedback, &state.deps, &state.workflow_config, &bus)
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    let response = match new_state.stage {
        Stage::Completed => AnalyzeResponse {
            status: "success",
            session_id: thread_id,
            report: new_state.report,
            error: None,
        },
        _ => AnalyzeResponse { status: "failed", session_id: thread_id, report: None, error: new_state.error },
    };
    Ok(Json(response))
}

/// No secondary `report_id -> thread_id` index exists in the storage layer
/// (spec §4.2 names only `inn`/`expires_at`/`created_at`/`risk_level` on the
/// reports space). Resolved by scanning the INN-scoped (or, lacking an INN,
/// the full) thread listing for the thread whose last analysis produced
/// this report — a documented simplification (see DESIGN.md).
async fn find_thread_for_report(
    state: &AppState,
    report_id: &str,
    inn: Option<&str>,
) -> ApiResult<vigil_core::model::ThreadRecord> {
    let candidates = if let Some(inn) = inn {
        state.deps.repository.list_threads_by_inn(inn).await
    } else {
        state.deps.repository.list_threads(500, 0).await
    }
    .map_err(|e| ApiError::from_vigil(&e, None))?;

    candidates
        .into_iter()
        .find(|t| t.thread_data.pending_report_id.as_deref() == Some(report_id))
        .ok_or_else(|| ApiError::not_found(format!("no thread found for report {report_id}")))
}

async fn analyze_client_async(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.enforce(&headers, RouteTier::Analyze)?;

    let publisher = state
        .queue_publisher
        .as_ref()
        .ok_or_else(|| ApiError::from_vigil(&VigilError::StorageUnavailable("queue runtime not configured".into()), None))?;

    let task = AnalysisTask::new(request.client_name, request.inn, request.additional_notes, 5);
    publisher.publish_analysis_task(&task).await.map_err(|e| ApiError::internal(e.to_string()))?;

    let status = serde_json::json!({ "status": TaskStatus::Pending });
    state
        .deps
        .repository
        .cache_set_with_ttl(&task_cache_key(&task.task_id), status, 86_400, "async_task_status")
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?;

    Ok(Json(serde_json::json!({ "task_id": task.task_id })))
}

/// Task status lives in the cache space keyed `task:{task_id}` rather than a
/// dedicated fourth space — spec §3/§4.2 name only cache/reports/threads,
/// and a status blob with a bounded TTL is exactly what the cache space is
/// for (see DESIGN.md).
pub fn task_cache_key(task_id: &str) -> String {
    format!("task:{task_id}")
}

async fn task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.enforce(&headers, RouteTier::Standard)?;

    let entry = state
        .deps
        .repository
        .cache_get(&task_cache_key(&task_id))
        .await
        .map_err(|e| ApiError::from_vigil(&e, None))?
        .ok_or_else(|| ApiError::not_found(format!("no task with id {task_id}")))?;

    Ok(Json(entry.value))
}
