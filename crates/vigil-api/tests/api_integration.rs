//! End-to-end route tests over a real [`Router`], grounded in the teacher's
//! `dashflow-registry/tests/api_integration.rs` style: a `test_router()`
//! helper wired to hand-rolled in-memory collaborators, driven through
//! `tower::ServiceExt::oneshot` rather than a bound TCP listener.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::util::ServiceExt;

use vigil_core::model::{SearchIntent, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{
    AnalyticsClient, AnalyticsRecord, CourtClient, CourtRecord, Healthcheck, LlmProvider,
    RegistryClient, RegistryRecord, SearchClient,
};
use vigil_core::VigilError;
use vigil_core::agents::writer::NoopPdfRenderer;
use vigil_core::workflow::{WorkflowConfig, WorkflowDeps};
use vigil_http::HttpCore;
use vigil_storage::InMemoryRepository;

fn ok_envelope(source: &str) -> SourceResultEnvelope {
    SourceResultEnvelope {
        source: source.to_string(),
        status: SourceStatus::Success,
        payload: Some(serde_json::json!({})),
        error: None,
        duration_ms: 1,
        retries: 0,
        circuit_state: vigil_core::model::CircuitState::Closed,
    }
}

struct StubRegistry;

#[async_trait]
impl Healthcheck for StubRegistry {
    async fn healthcheck(&self, _timeout: Duration) -> vigil_core::Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "registry"
    }
}

#[async_trait]
impl RegistryClient for StubRegistry {
    async fn lookup(
        &self,
        _client_name: &str,
        _inn: Option<&str>,
    ) -> vigil_core::Result<(SourceResultEnvelope, RegistryRecord)> {
        Ok((ok_envelope("registry"), RegistryRecord::default()))
    }
}

struct StubCourt;

#[async_trait]
impl Healthcheck for StubCourt {
    async fn healthcheck(&self, _timeout: Duration) -> vigil_core::Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "court"
    }
}

#[async_trait]
impl CourtClient for StubCourt {
    async fn search_cases(
        &self,
        _client_name: &str,
        _inn: Option<&str>,
    ) -> vigil_core::Result<(SourceResultEnvelope, CourtRecord)> {
        Ok((ok_envelope("court"), CourtRecord::default()))
    }
}

struct StubAnalytics;

#[async_trait]
impl Healthcheck for StubAnalytics {
    async fn healthcheck(&self, _timeout: Duration) -> vigil_core::Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "analytics"
    }
}

#[async_trait]
impl AnalyticsClient for StubAnalytics {
    async fn analyze(
        &self,
        _client_name: &str,
        _inn: Option<&str>,
    ) -> vigil_core::Result<(SourceResultEnvelope, AnalyticsRecord)> {
        Ok((ok_envelope("analytics"), AnalyticsRecord::default()))
    }
}

struct StubSearch;

#[async_trait]
impl Healthcheck for StubSearch {
    async fn healthcheck(&self, _timeout: Duration) -> vigil_core::Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "stub_search"
    }
}

#[async_trait]
impl SearchClient for StubSearch {
    async fn search(
        &self,
        _intent: &SearchIntent,
        _client_name: &str,
    ) -> vigil_core::Result<(SourceResultEnvelope, Vec<vigil_core::model::SearchResultSnippet>)> {
        Ok((ok_envelope("stub_search"), Vec::new()))
    }
}

/// Never configured, so the LLM cascade skips it unconditionally and
/// `analyzer::analyze` falls back to `degraded_report` — a real, assertable
/// report without needing a stub that speaks the JSON schema.
struct UnconfiguredLlm;

#[async_trait]
impl LlmProvider for UnconfiguredLlm {
    fn name(&self) -> &str {
        "unconfigured"
    }
    fn is_configured(&self) -> bool {
        false
    }
    async fn generate_text(&self, _prompt: &str, _timeout: Duration) -> vigil_core::Result<String> {
        Err(VigilError::LlmUnavailable)
    }
    async fn generate_json(
        &self,
        _prompt: &str,
        _schema: &serde_json::Value,
        _timeout: Duration,
    ) -> vigil_core::Result<serde_json::Value> {
        Err(VigilError::LlmUnavailable)
    }
}

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_router() -> Router {
    let deps = Arc::new(WorkflowDeps {
        registry: Arc::new(StubRegistry),
        court: Arc::new(StubCourt),
        analytics: Arc::new(StubAnalytics),
        search_clients: vec![Arc::new(StubSearch)],
        llm_providers: vec![Box::new(UnconfiguredLlm)],
        repository: Arc::new(InMemoryRepository::new()),
        pdf_renderer: Arc::new(NoopPdfRenderer),
    });
    let workflow_config = Arc::new(WorkflowConfig::default());
    let http = Arc::new(HttpCore::new());
    let metrics_registry = Arc::new(prometheus::Registry::new());
    vigil_http::metrics::register(&metrics_registry).expect("register metrics");

    let state = vigil_api::AppState::new(
        deps,
        workflow_config,
        http,
        metrics_registry,
        None,
        ADMIN_TOKEN.to_string(),
    );
    vigil_api::build_router(state)
}

#[tokio::test]
async fn liveness_health_check_returns_ok() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/utility/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage_backend"], "in_memory");
}

#[tokio::test]
async fn get_report_for_unknown_id_is_404() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/reports/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_route_without_token_is_unauthorized() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/utility/circuit-breakers/registry/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_with_wrong_token_is_unauthorized() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/utility/circuit-breakers/registry/reset")
                .header("x-auth-token", "wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_with_correct_token_succeeds() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/utility/circuit-breakers/registry/reset")
                .header("x-auth-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn analyze_client_returns_a_degraded_report_without_a_configured_llm() {
    let router = test_router();
    let request_body = serde_json::json!({ "client_name": "Acme Trading LLC" }).to_string();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agent/analyze-client")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["report"]["degraded"], true);
    assert!(json["report"]["risk_assessment"].is_object());
}

/// Empty `client_name` fails inside the workflow (`VigilError::InvalidInput`),
/// not at JSON deserialization — the route always answers 200 with a
/// `status: "failed"` envelope, per spec §7's error-object shape.
#[tokio::test]
async fn analyze_client_with_empty_client_name_fails_inside_the_workflow() {
    let router = test_router();
    let request_body = serde_json::json!({ "client_name": "" }).to_string();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agent/analyze-client")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"]["kind"], "InvalidInput");
}
