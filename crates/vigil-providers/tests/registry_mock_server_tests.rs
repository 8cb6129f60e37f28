//! Integration tests for the registry client against a mock HTTP server.
//! Run with: cargo test -p vigil-providers --test registry_mock_server_tests

use std::sync::Arc;
use vigil_core::model::SourceStatus;
use vigil_core::traits::RegistryClient;
use vigil_http::HttpCore;
use vigil_providers::RegistryApiClient;
use vigil_storage::InMemoryRepository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RegistryApiClient {
    RegistryApiClient::new(
        Arc::new(HttpCore::new()),
        Arc::new(InMemoryRepository::new()),
        server.uri(),
        Some("test-key".to_string()),
    )
}

#[tokio::test]
async fn lookup_parses_successful_response_into_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "active",
            "sanctions_flag": false,
            "terrorist_list_flag": false,
            "tax_debt_flag": true,
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let (envelope, record) = client.lookup("Acme LLC", Some("7736050003")).await.unwrap();

    assert_eq!(envelope.status, SourceStatus::Success);
    assert_eq!(record.status.as_deref(), Some("active"));
    assert!(record.tax_debt_flag);
    assert!(!record.sanctions_flag);
}

#[tokio::test]
async fn lookup_caches_second_call_without_hitting_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "active", "sanctions_flag": false, "terrorist_list_flag": false, "tax_debt_flag": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let (_, first) = client.lookup("Beta Corp", None).await.unwrap();
    let (envelope, second) = client.lookup("Beta Corp", None).await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(envelope.duration_ms, 0, "cache hit should not measure network latency");
}

#[tokio::test]
async fn lookup_propagates_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/lookup"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.lookup("Gamma Ltd", None).await;
    assert!(result.is_err());
}
