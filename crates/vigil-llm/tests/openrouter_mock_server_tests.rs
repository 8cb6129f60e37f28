use std::sync::Arc;
use std::time::Duration;
use vigil_core::traits::LlmProvider;
use vigil_http::HttpCore;
use vigil_llm::OpenRouterProvider;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenRouterProvider {
    OpenRouterProvider::new(Arc::new(HttpCore::new()), Some("test-key".to_string())).with_base_url(server.uri())
}

#[tokio::test]
async fn generate_text_returns_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Acme LLC looks low-risk."}}]
        })))
        .mount(&server)
        .await;

    let text = provider(&server).generate_text("summarize", Duration::from_secs(5)).await.unwrap();
    assert_eq!(text, "Acme LLC looks low-risk.");
}

#[tokio::test]
async fn generate_json_extracts_fenced_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "```json\n{\"summary\": \"ok\"}\n```"}}]
        })))
        .mount(&server)
        .await;

    let schema = serde_json::json!({"type": "object"});
    let value = provider(&server).generate_json("analyze", &schema, Duration::from_secs(5)).await.unwrap();
    assert_eq!(value, serde_json::json!({"summary": "ok"}));
}

#[tokio::test]
async fn upstream_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = provider(&server).generate_text("summarize", Duration::from_secs(5)).await;
    assert!(result.is_err());
}
