//! Web-search client modeled directly on the teacher's `dashflow-tavily`:
//! same request shape (`api_key`, `query`, `search_depth`, `topic`,
//! `max_results`), same POST endpoint, same result fields, adapted to
//! return [`SearchResultSnippet`]s through the resilient HTTP core instead
//! of a `Tool::_call` string.

use crate::cache;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::model::{CircuitState, SearchIntent, SearchResultSnippet, Sentiment, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{Healthcheck, Repository, SearchClient};
use vigil_core::{Result, VigilError};
use vigil_http::HttpCore;

/// `search-basic` / `search-deep` timeout profiles (spec §6.6); Tavily's
/// "advanced" depth maps to the deep profile.
pub const BASIC_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Serialize)]
struct TavilySearchRequest {
    api_key: String,
    query: String,
    search_depth: String,
    max_results: u32,
    include_answer: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

pub struct TavilySearchProvider {
    http: Arc<HttpCore>,
    repository: Arc<dyn Repository>,
    api_key: String,
    max_results: u32,
    search_depth: String,
}

impl TavilySearchProvider {
    pub fn new(http: Arc<HttpCore>, repository: Arc<dyn Repository>, api_key: String) -> Self {
        Self { http, repository, api_key, max_results: 5, search_depth: "basic".to_string() }
    }

    pub fn from_env(http: Arc<HttpCore>, repository: Arc<dyn Repository>) -> Option<Self> {
        std::env::var("TAVILY_API_KEY").ok().map(|key| Self::new(http, repository, key))
    }

    fn timeout(&self) -> Duration {
        if self.search_depth == "advanced" { DEEP_TIMEOUT } else { BASIC_TIMEOUT }
    }
}

#[async_trait]
impl Healthcheck for TavilySearchProvider {
    async fn healthcheck(&self, timeout: Duration) -> Result<()> {
        let opts = vigil_http::RequestOptions { timeout, ..Default::default() };
        let body = serde_json::json!({ "api_key": self.api_key, "query": "healthcheck", "max_results": 1 });
        self.http
            .request(Method::POST, "https://api.tavily.com/search", Some(&body), &opts)
            .await
            .map(|_| ())
            .map_err(VigilError::from)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[async_trait]
impl SearchClient for TavilySearchProvider {
    async fn search(&self, intent: &SearchIntent, client_name: &str) -> Result<(SourceResultEnvelope, Vec<SearchResultSnippet>)> {
        let category_label = format!("{:?}", intent.category);
        let key = cache::search_cache_key("tavily", client_name, &category_label, &intent.query);

        if let Some(entry) = self.repository.cache_get(&key).await? {
            let snippets: Vec<SearchResultSnippet> = serde_json::from_value(entry.value.clone())
                .map_err(|e| VigilError::InternalError(format!("cached tavily payload malformed: {e}")))?;
            return Ok((
                SourceResultEnvelope {
                    source: "tavily".to_string(),
                    status: SourceStatus::Success,
                    payload: Some(entry.value),
                    error: None,
                    duration_ms: 0,
                    retries: 0,
                    circuit_state: CircuitState::Closed,
                },
                snippets,
            ));
        }

        let request = TavilySearchRequest {
            api_key: self.api_key.clone(),
            query: intent.query.clone(),
            search_depth: self.search_depth.clone(),
            max_results: self.max_results,
            include_answer: false,
        };
        let url = "https://api.tavily.com/search";
        let host = HttpCore::host_key(url);
        let opts = vigil_http::RequestOptions { timeout: self.timeout(), ..Default::default() };
        let started = std::time::Instant::now();
        let body = serde_json::to_value(&request).map_err(|e| VigilError::InternalError(e.to_string()))?;
        let resp = self.http.request(Method::POST, url, Some(&body), &opts).await.map_err(VigilError::from)?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let parsed: TavilySearchResponse = resp.json().map_err(VigilError::from)?;
        let snippets: Vec<SearchResultSnippet> = parsed
            .results
            .into_iter()
            .map(|r| SearchResultSnippet {
                category: intent.category,
                source: "tavily".to_string(),
                title: r.title,
                snippet: r.content,
                url: r.url,
                sentiment: Sentiment::Neutral,
            })
            .collect();

        let payload = serde_json::to_value(&snippets).map_err(|e| VigilError::InternalError(e.to_string()))?;
        self.repository.cache_set_with_ttl(&key, payload.clone(), cache::SEARCH_TTL_SECONDS, "tavily").await?;

        Ok((
            SourceResultEnvelope {
                source: "tavily".to_string(),
                status: SourceStatus::Success,
                payload: Some(payload),
                error: None,
                duration_ms,
                retries: resp.retries,
                circuit_state: self.http.circuit_state(&host),
            },
            snippets,
        ))
    }
}
