//! HuggingFace Inference API provider: second in the cascade (spec §4.4).
//! Grounded directly in the teacher's `dashflow-huggingface::ChatHuggingFace`
//! — same env vars, same `inputs`/`parameters`/`options` request shape, same
//! endpoint convention (`api-inference.huggingface.co/models/{model_id}`).
//! The real endpoint responds with a JSON array of generations; the
//! teacher's `HuggingFaceResponse` models a single element, so this takes
//! the first entry of that array.

use crate::jsonmode;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::traits::LlmProvider;
use vigil_core::{Result, VigilError};
use vigil_http::{HttpCore, RequestOptions};

const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";

#[derive(Debug, Serialize)]
struct HuggingFaceRequest {
    inputs: String,
    parameters: HuggingFaceParameters,
    options: HuggingFaceOptions,
}

#[derive(Debug, Serialize)]
struct HuggingFaceParameters {
    temperature: f64,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct HuggingFaceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct HuggingFaceResponse {
    #[serde(default)]
    generated_text: String,
}

pub struct HuggingFaceProvider {
    http: Arc<HttpCore>,
    endpoint_url: String,
    api_token: Option<String>,
}

impl HuggingFaceProvider {
    pub fn new(http: Arc<HttpCore>, model_id: impl Into<String>, api_token: Option<String>) -> Self {
        let model_id = model_id.into();
        Self {
            http,
            endpoint_url: format!("https://api-inference.huggingface.co/models/{model_id}"),
            api_token,
        }
    }

    pub fn from_env(http: Arc<HttpCore>) -> Self {
        let model_id = std::env::var("HUGGINGFACE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_token = std::env::var("HUGGINGFACEHUB_API_TOKEN").or_else(|_| std::env::var("HF_TOKEN")).ok();
        Self::new(http, model_id, api_token)
    }

    async fn complete(&self, prompt: String, timeout: Duration) -> Result<String> {
        let token = self
            .api_token
            .as_ref()
            .ok_or_else(|| VigilError::InternalError("huggingface: called without an API token".to_string()))?;

        let body = serde_json::to_value(HuggingFaceRequest {
            inputs: prompt,
            parameters: HuggingFaceParameters { temperature: 0.3, max_new_tokens: 1024, return_full_text: false },
            options: HuggingFaceOptions { wait_for_model: true },
        })
        .map_err(|e| VigilError::InternalError(e.to_string()))?;

        let opts = RequestOptions {
            timeout,
            headers: vec![("Authorization".to_string(), format!("Bearer {token}"))],
            ..Default::default()
        };
        let resp = self
            .http
            .request(Method::POST, &self.endpoint_url, Some(&body), &opts)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "huggingface request failed");
                VigilError::from(e)
            })?;

        let parsed: Vec<HuggingFaceResponse> = resp.json().map_err(VigilError::from)?;
        let text = parsed.into_iter().next().map(|r| r.generated_text).unwrap_or_default();
        if text.trim().is_empty() {
            return Err(VigilError::ProviderError { source: "huggingface".to_string(), message: "empty completion".to_string() });
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
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
    fn unconfigured_without_token() {
        let provider = HuggingFaceProvider::new(Arc::new(HttpCore::new()), "some/model", None);
        assert!(!provider.is_configured());
        assert_eq!(provider.name(), "huggingface");
    }

    #[test]
    fn endpoint_url_is_derived_from_model_id() {
        let provider = HuggingFaceProvider::new(
            Arc::new(HttpCore::new()),
            "meta-llama/Llama-3.1-8B-Instruct",
            Some("tok".to_string()),
        );
        assert_eq!(provider.endpoint_url, "https://api-inference.huggingface.co/models/meta-llama/Llama-3.1-8B-Instruct");
    }
}
