//! GigaChat provider: third in the cascade (spec §4.4). GigaChat exposes an
//! OpenAI-compatible `chat/completions` endpoint once authenticated, so the
//! wire shape mirrors [`crate::openrouter`]; the OAuth2 client-credentials
//! exchange GigaChat normally requires is out of scope here (narrow
//! contract, per spec.md §1) — this provider takes an already-issued bearer
//! access token rather than performing the exchange itself.

use crate::jsonmode;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::traits::LlmProvider;
use vigil_core::{Result, VigilError};
use vigil_http::{HttpCore, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1";
const DEFAULT_MODEL: &str = "GigaChat";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

pub struct GigaChatProvider {
    http: Arc<HttpCore>,
    base_url: String,
    model: String,
    access_token: Option<String>,
}

impl GigaChatProvider {
    pub fn new(http: Arc<HttpCore>, access_token: Option<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            access_token,
        }
    }

    pub fn from_env(http: Arc<HttpCore>) -> Self {
        let mut provider = Self::new(http, std::env::var("GIGACHAT_ACCESS_TOKEN").ok());
        if let Ok(model) = std::env::var("GIGACHAT_MODEL") {
            provider.model = model;
        }
        if let Ok(base_url) = std::env::var("GIGACHAT_BASE_URL") {
            provider.base_url = base_url;
        }
        provider
    }

    async fn complete(&self, prompt: String, timeout: Duration) -> Result<String> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| VigilError::InternalError("gigachat: called without an access token".to_string()))?;

        let body = serde_json::to_value(ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user", content: prompt }],
        })
        .map_err(|e| VigilError::InternalError(e.to_string()))?;

        let opts = RequestOptions {
            timeout,
            headers: vec![("Authorization".to_string(), format!("Bearer {token}"))],
            ..Default::default()
        };
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .request(Method::POST, &url, Some(&body), &opts)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "gigachat request failed");
                VigilError::from(e)
            })?;

        let parsed: ChatCompletionResponse = resp.json().map_err(VigilError::from)?;
        let content = parsed.choices.into_iter().next().map(|c| c.message.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(VigilError::ProviderError { source: "gigachat".to_string(), message: "empty completion".to_string() });
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for GigaChatProvider {
    fn name(&self) -> &str {
        "gigachat"
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    async fn generate_text(&self, prompt: &str, timeout: Duration) -> Result<String> {
        self.complete(prompt.to_string(), timeout).await
    }

    async fn generate_json(&self, prompt: &str, schema: &serde_json::Value, timeout: Duration) -> Result<serde_json::Value> {
        let text = self.complete(jsonmode::with_schema_instruction(prompt, schema), timeout).await?;
        jsonmode::extract_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_without_access_token() {
        let provider = GigaChatProvider::new(Arc::new(HttpCore::new()), None);
        assert!(!provider.is_configured());
        assert_eq!(provider.name(), "gigachat");
    }

    #[test]
    fn configured_with_access_token() {
        assert!(GigaChatProvider::new(Arc::new(HttpCore::new()), Some("token".to_string())).is_configured());
    }
}
