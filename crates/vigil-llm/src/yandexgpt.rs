//! YandexGPT provider: last in the cascade (spec §4.4). Unlike the other
//! three, Yandex's Foundation Models completion API has its own wire shape
//! (`modelUri`/`completionOptions`/`alternatives`) rather than an
//! OpenAI-compatible one, so this file doesn't share structs with
//! [`crate::openrouter`]/[`crate::gigachat`] — each vendor gets its own
//! request/response types, same as the teacher keeps one crate per vendor.

use crate::jsonmode;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::traits::LlmProvider;
use vigil_core::{Result, VigilError};
use vigil_http::{HttpCore, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
const DEFAULT_MODEL: &str = "yandexgpt-lite";

#[derive(Debug, Serialize)]
struct CompletionOptions {
    stream: bool,
    temperature: f64,
    #[serde(rename = "maxTokens")]
    max_tokens: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    #[serde(rename = "modelUri")]
    model_uri: String,
    #[serde(rename = "completionOptions")]
    completion_options: CompletionOptions,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}

pub struct YandexGptProvider {
    http: Arc<HttpCore>,
    base_url: String,
    model: String,
    api_key: Option<String>,
    folder_id: Option<String>,
}

impl YandexGptProvider {
    pub fn new(http: Arc<HttpCore>, api_key: Option<String>, folder_id: Option<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
            folder_id,
        }
    }

    pub fn from_env(http: Arc<HttpCore>) -> Self {
        let mut provider = Self::new(
            http,
            std::env::var("YANDEXGPT_API_KEY").ok(),
            std::env::var("YANDEXGPT_FOLDER_ID").ok(),
        );
        if let Ok(model) = std::env::var("YANDEXGPT_MODEL") {
            provider.model = model;
        }
        provider
    }

    async fn complete(&self, prompt: String, timeout: Duration) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| VigilError::InternalError("yandexgpt: called without an API key".to_string()))?;
        let folder_id = self
            .folder_id
            .as_ref()
            .ok_or_else(|| VigilError::InternalError("yandexgpt: called without a folder id".to_string()))?;

        let body = serde_json::to_value(CompletionRequest {
            model_uri: format!("gpt://{folder_id}/{}", self.model),
            completion_options: CompletionOptions { stream: false, temperature: 0.3, max_tokens: "2000".to_string() },
            messages: vec![Message { role: "user", text: prompt }],
        })
        .map_err(|e| VigilError::InternalError(e.to_string()))?;

        let opts = RequestOptions {
            timeout,
            headers: vec![
                ("Authorization".to_string(), format!("Api-Key {api_key}")),
                ("x-folder-id".to_string(), folder_id.clone()),
            ],
            ..Default::default()
        };
        let resp = self
            .http
            .request(Method::POST, &self.base_url, Some(&body), &opts)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "yandexgpt request failed");
                VigilError::from(e)
            })?;

        let parsed: CompletionResponse = resp.json().map_err(VigilError::from)?;
        let text = parsed.result.alternatives.into_iter().next().map(|a| a.message.text).unwrap_or_default();
        if text.trim().is_empty() {
            return Err(VigilError::ProviderError { source: "yandexgpt".to_string(), message: "empty completion".to_string() });
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for YandexGptProvider {
    fn name(&self) -> &str {
        "yandexgpt"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.folder_id.is_some()
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
    fn unconfigured_missing_folder_id() {
        let provider = YandexGptProvider::new(Arc::new(HttpCore::new()), Some("key".to_string()), None);
        assert!(!provider.is_configured());
        assert_eq!(provider.name(), "yandexgpt");
    }

    #[test]
    fn configured_with_key_and_folder() {
        let provider = YandexGptProvider::new(
            Arc::new(HttpCore::new()),
            Some("key".to_string()),
            Some("folder".to_string()),
        );
        assert!(provider.is_configured());
    }
}
