//! Court-case search client: same generic "gov data" JSON API shape as
//! [`crate::registry`], against a courts docket endpoint.

use crate::cache;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::inn::is_valid_inn;
use vigil_core::model::{CircuitState, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{CourtClient, CourtRecord, Healthcheck, Repository};
use vigil_core::{Result, VigilError};
use vigil_http::HttpCore;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct CourtApiResponse {
    #[serde(default)]
    case_count: u32,
    #[serde(default)]
    recent_case_count: u32,
}

pub struct CourtApiClient {
    http: Arc<HttpCore>,
    repository: Arc<dyn Repository>,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CourtApiClient {
    pub fn new(http: Arc<HttpCore>, repository: Arc<dyn Repository>, base_url: String, api_key: Option<String>) -> Self {
        Self { http, repository, base_url, api_key, timeout: DEFAULT_TIMEOUT }
    }

    pub fn from_env(http: Arc<HttpCore>, repository: Arc<dyn Repository>) -> Self {
        Self::new(
            http,
            repository,
            std::env::var("COURT_API_BASE_URL").unwrap_or_else(|_| "https://courts.example.gov/api/v1".to_string()),
            std::env::var("COURT_API_KEY").ok(),
        )
    }

    fn url(&self, client_name: &str, inn: Option<&str>) -> String {
        let mut url = format!("{}/cases/search?name={}", self.base_url, crate::util::urlencode(client_name));
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
impl Healthcheck for CourtApiClient {
    async fn healthcheck(&self, timeout: Duration) -> Result<()> {
        let opts = vigil_http::RequestOptions { timeout, ..Default::default() };
        self.http
            .request(Method::GET, &format!("{}/health", self.base_url), None, &opts)
            .await
            .map(|_| ())
            .map_err(VigilError::from)
    }

    fn name(&self) -> &str {
        "court"
    }
}

#[async_trait]
impl CourtClient for CourtApiClient {
    async fn search_cases(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, CourtRecord)> {
        if let Some(inn) = inn {
            if !is_valid_inn(inn) {
                tracing::warn!(inn, "court search called with invalid INN; proceeding without INN filter");
            }
        }

        let key = cache::cache_key("court", client_name, inn);
        if let Some(entry) = self.repository.cache_get(&key).await? {
            let parsed: CourtApiResponse = serde_json::from_value(entry.value.clone())
                .map_err(|e| VigilError::InternalError(format!("cached court payload malformed: {e}")))?;
            let record = CourtRecord { case_count: parsed.case_count, recent_case_count: parsed.recent_case_count, raw: entry.value };
            return Ok((
                SourceResultEnvelope {
                    source: "court".to_string(),
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
        let parsed: CourtApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| VigilError::InternalError(format!("court response malformed: {e}")))?;

        self.repository.cache_set_with_ttl(&key, raw.clone(), cache::COURT_TTL_SECONDS, "court").await?;

        let record = CourtRecord { case_count: parsed.case_count, recent_case_count: parsed.recent_case_count, raw };
        Ok((
            SourceResultEnvelope {
                source: "court".to_string(),
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
