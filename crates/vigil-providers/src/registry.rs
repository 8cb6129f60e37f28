//! Company registry client: status and compliance-flag lookups against a
//! generic government open-data JSON API. Grounded in the teacher's
//! `reqwest`-direct provider style (`dashflow-tavily`) rather than a
//! generated OpenAPI client, since the upstream here is a narrow JSON GET.

use crate::cache;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;
use vigil_core::inn::is_valid_inn;
use vigil_core::model::{CircuitState, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{Healthcheck, RegistryClient, RegistryRecord, Repository};
use vigil_core::{Result, VigilError};
use vigil_http::HttpCore;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct RegistryApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    sanctions_flag: bool,
    #[serde(default)]
    terrorist_list_flag: bool,
    #[serde(default)]
    tax_debt_flag: bool,
}

pub struct RegistryApiClient {
    http: std::sync::Arc<HttpCore>,
    repository: std::sync::Arc<dyn Repository>,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RegistryApiClient {
    pub fn new(http: std::sync::Arc<HttpCore>, repository: std::sync::Arc<dyn Repository>, base_url: String, api_key: Option<String>) -> Self {
        Self { http, repository, base_url, api_key, timeout: DEFAULT_TIMEOUT }
    }

    pub fn from_env(http: std::sync::Arc<HttpCore>, repository: std::sync::Arc<dyn Repository>) -> Self {
        Self::new(
            http,
            repository,
            std::env::var("REGISTRY_API_BASE_URL").unwrap_or_else(|_| "https://registry.example.gov/api/v1".to_string()),
            std::env::var("REGISTRY_API_KEY").ok(),
        )
    }

    fn url(&self, client_name: &str, inn: Option<&str>) -> String {
        let mut url = format!("{}/companies/lookup?name={}", self.base_url, crate::util::urlencode(client_name));
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
impl Healthcheck for RegistryApiClient {
    async fn healthcheck(&self, timeout: Duration) -> Result<()> {
        let opts = vigil_http::RequestOptions { timeout, ..Default::default() };
        self.http
            .request(Method::GET, &format!("{}/health", self.base_url), None, &opts)
            .await
            .map(|_| ())
            .map_err(VigilError::from)
    }

    fn name(&self) -> &str {
        "registry"
    }
}

#[async_trait]
impl RegistryClient for RegistryApiClient {
    async fn lookup(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, RegistryRecord)> {
        if let Some(inn) = inn {
            if !is_valid_inn(inn) {
                tracing::warn!(inn, "registry lookup called with invalid INN; proceeding without INN filter");
            }
        }

        let key = cache::cache_key("registry", client_name, inn);
        if let Some(entry) = self.repository.cache_get(&key).await? {
            let parsed: RegistryApiResponse = serde_json::from_value(entry.value.clone())
                .map_err(|e| VigilError::InternalError(format!("cached registry payload malformed: {e}")))?;
            let record = RegistryRecord {
                status: parsed.status,
                sanctions_flag: parsed.sanctions_flag,
                terrorist_list_flag: parsed.terrorist_list_flag,
                tax_debt_flag: parsed.tax_debt_flag,
                raw: entry.value,
            };
            return Ok((
                SourceResultEnvelope {
                    source: "registry".to_string(),
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
        let parsed: RegistryApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| VigilError::InternalError(format!("registry response malformed: {e}")))?;

        self.repository.cache_set_with_ttl(&key, raw.clone(), cache::REGISTRY_TTL_SECONDS, "registry").await?;

        let record = RegistryRecord {
            status: parsed.status,
            sanctions_flag: parsed.sanctions_flag,
            terrorist_list_flag: parsed.terrorist_list_flag,
            tax_debt_flag: parsed.tax_debt_flag,
            raw,
        };
        Ok((
            SourceResultEnvelope {
                source: "registry".to_string(),
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
