//! OpenRouter provider: first in the cascade (spec §4.4). Wire shape is the
//! OpenAI chat-completions format, grounded in the teacher's
//! `dashflow-openai` `choices[0].message.content` response handling.

use crate::jsonmode;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::traits::LlmProvider;
use vigil_core::{Result, VigilError};
use vigil_http::{HttpCore, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

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

pub struct OpenRouterProvider {
    http: Arc<HttpCore>,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenRouterProvider {
    pub fn new(http: Arc<HttpCore>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        }
    }

    pub fn from_env(http: Arc<HttpCore>) -> Self {
        let mut provider = Self::new(http, std::env::var("OPENROUTER_API_KEY").ok());
        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            provider.model = model;
        }
        if let Ok(base_url) = std::env::var("OPENROUTER_BASE_URL") {
            provider.base_url = base_url;
        }
        provider
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete(&self, prompt: String, timeout: Duration) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| VigilError::InternalError("openrouter: called without an API key".to_string()))?;

        let body = serde_json::to_value(ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user", content: prompt }],
        })
        .map_err(|e| VigilError::InternalError(e.to_string()))?;

        let opts = RequestOptions {
            timeout,
            headers: vec![("Authorization".to_string(), format!("Bearer {api_key}"))],
            ..Default::default()
        };
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .request(Method::POST, &url, Some(&body), &opts)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "openrouter request failed");
                VigilError::from(e)
            })?;

        let parsed: ChatCompletionResponse = resp.json().map_err(VigilError::from)?;
        let content = parsed.choices.into_iter().next().map(|c| c.message.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(VigilError::ProviderError { source: "openrouter".to_string(), message: "empty completion".to_string() });
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
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
    fn unconfigured_without_api_key() {
        let provider = OpenRouterProvider::new(Arc::new(HttpCore::new()), None);
        assert!(!provider.is_configured());
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn configured_with_api_key() {
        let provider = OpenRouterProvider::new(Arc::new(HttpCore::new()), Some("sk-test".to_string()));
        assert!(provider.is_configured());
    }
}
