//! Bankruptcy/negative-flag analytics client: same generic "gov data" JSON
//! API shape as [`crate::registry`] and [`crate::court`].

use crate::cache;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::inn::is_valid_inn;
use vigil_core::model::{CircuitState, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{AnalyticsClient, AnalyticsRecord, Healthcheck, Repository};
use vigil_core::{Result, VigilError};
use vigil_http::HttpCore;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AnalyticsApiResponse {
    #[serde(default)]
    bankruptcy_flag: bool,
    #[serde(default)]
    negative_flags: u32,
}

pub struct AnalyticsApiClient {
    http: Arc<HttpCore>,
    repository: Arc<dyn Repository>,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl AnalyticsApiClient {
    pub fn new(http: Arc<HttpCore>, repository: Arc<dyn Repository>, base_url: String, api_key: Option<String>) -> Self {
        Self { http, repository, base_url, api_key, timeout: DEFAULT_TIMEOUT }
    }

    pub fn from_env(http: Arc<HttpCore>, repository: Arc<dyn Repository>) -> Self {
        Self::new(
            http,
            repository,
            std::env::var("ANALYTICS_API_BASE_URL").unwrap_or_else(|_| "https://analytics.example.gov/api/v1".to_string()),
            std::env::var("ANALYTICS_API_KEY").ok(),
        )
    }

    fn url(&self, client_name: &str, inn: Option<&str>) -> String {
        let mut url = format!("{}/companies/analyze?name={}", self.base_url, crate::util::urlencode(client_name));
        if let Some(inn) = inn {
            url.push_str(&format!("&inn={inn}"));
        }
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&api_key={key}"));
        }
        url
    }
}

#[async_trait]
impl Healthcheck for AnalyticsApiClient {
    async fn healthcheck(&self, timeout: Duration) -> Result<()> {
        let opts = vigil_http::RequestOptions { timeout, ..Default::default() };
        self.http
            .request(Method::GET, &format!("{}/health", self.base_url), None, &opts)
            .await
            .map(|_| ())
            .map_err(VigilError::from)
    }

    fn name(&self) -> &str {
        "analytics"
    }
}

#[async_trait]
impl AnalyticsClient for AnalyticsApiClient {
    async fn analyze(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, AnalyticsRecord)> {
        if let Some(inn) = inn {
            if !is_valid_inn(inn) {
                tracing::warn!(inn, "analytics call made with invalid INN; proceeding without INN filter");
            }
        }

        let key = cache::cache_key("analytics", client_name, inn);
        if let Some(entry) = self.repository.cache_get(&key).await? {
            let parsed: AnalyticsApiResponse = serde_json::from_value(entry.value.clone())
                .map_err(|e| VigilError::InternalError(format!("cached analytics payload malformed: {e}")))?;
            let record = AnalyticsRecord { bankruptcy_flag: parsed.bankruptcy_flag, negative_flags: parsed.negative_flags, raw: entry.value };
            return Ok((
                SourceResultEnvelope {
                    source: "analytics".to_string(),
                    status: SourceStatus::Success,
                    payload: Some(record.raw.clone()),
                    error: None,
                    duration_ms: 0,
                    retries: 0,
                    circuit_state: CircuitState::Closed,
                },
                record,
            ));
        }

        let url = self.url(client_name, inn);
        let host = HttpCore::host_key(&url);
        let opts = vigil_http::RequestOptions { timeout: self.timeout, ..Default::default() };
        let started = std::time::Instant::now();
        let resp = self.http.request(Method::GET, &url, None, &opts).await.map_err(VigilError::from)?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let raw: serde_json::Value = resp.json().map_err(VigilError::from)?;
        let parsed: AnalyticsApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| VigilError::InternalError(format!("analytics response malformed: {e}")))?;

        self.repository.cache_set_with_ttl(&key, raw.clone(), cache::ANALYTICS_TTL_SECONDS, "analytics").await?;

        let record = AnalyticsRecord { bankruptcy_flag: parsed.bankruptcy_flag, negative_flags: parsed.negative_flags, raw };
        Ok((
            SourceResultEnvelope {
                source: "analytics".to_string(),
                status: SourceStatus::Success,
                payload: Some(record.raw.clone()),
                error: None,
                duration_ms,
                retries: resp.retries,
                circuit_state: self.http.circuit_state(&host),
            },
            record,
        ))
    }
}
