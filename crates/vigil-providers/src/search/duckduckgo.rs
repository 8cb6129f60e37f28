//! Web-search client modeled on the teacher's `dashflow-duckduckgo`: no API
//! key, privacy-focused. Rather than scraping `html.duckduckgo.com` (which
//! would pull in an HTML-parsing dependency the workspace doesn't otherwise
//! need), this uses DuckDuckGo's public Instant Answer JSON API and maps its
//! `RelatedTopics` into snippets — same "no key required" posture, JSON
//! instead of HTML to stay consistent with how every other provider client
//! here talks to its upstream.

use crate::cache;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::model::{CircuitState, SearchIntent, SearchResultSnippet, Sentiment, SourceResultEnvelope, SourceStatus};
use vigil_core::traits::{Healthcheck, Repository, SearchClient};
use vigil_core::{Result, VigilError};
use vigil_http::HttpCore;

pub const TIMEOUT: Duration = Duration::from_secs(45);
const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(default)]
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(default)]
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DuckDuckGoResponse {
    #[serde(default)]
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

pub struct DuckDuckGoSearchProvider {
    http: Arc<HttpCore>,
    repository: Arc<dyn Repository>,
}

impl DuckDuckGoSearchProvider {
    pub fn new(http: Arc<HttpCore>, repository: Arc<dyn Repository>) -> Self {
        Self { http, repository }
    }
}

#[async_trait]
impl Healthcheck for DuckDuckGoSearchProvider {
    async fn healthcheck(&self, timeout: Duration) -> Result<()> {
        let opts = vigil_http::RequestOptions { timeout, ..Default::default() };
        self.http
            .request(Method::GET, "https://api.duckduckgo.com/?q=healthcheck&format=json", None, &opts)
            .await
            .map(|_| ())
            .map_err(VigilError::from)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoSearchProvider {
    async fn search(&self, intent: &SearchIntent, client_name: &str) -> Result<(SourceResultEnvelope, Vec<SearchResultSnippet>)> {
        let category_label = format!("{:?}", intent.category);
        let key = cache::search_cache_key("duckduckgo", client_name, &category_label, &intent.query);

        if let Some(entry) = self.repository.cache_get(&key).await? {
            let snippets: Vec<SearchResultSnippet> = serde_json::from_value(entry.value.clone())
                .map_err(|e| VigilError::InternalError(format!("cached duckduckgo payload malformed: {e}")))?;
            return Ok((
                SourceResultEnvelope {
                    source: "duckduckgo".to_string(),
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

        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            crate::util::urlencode(&intent.query)
        );
        let host = HttpCore::host_key(&url);
        let opts = vigil_http::RequestOptions { timeout: TIMEOUT, ..Default::default() };
        let started = std::time::Instant::now();
        let resp = self.http.request(Method::GET, &url, None, &opts).await.map_err(VigilError::from)?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let parsed: DuckDuckGoResponse = resp.json().map_err(VigilError::from)?;
        let snippets: Vec<SearchResultSnippet> = parsed
            .related_topics
            .into_iter()
            .filter_map(|t| {
                let text = t.text?;
                let url = t.first_url?;
                Some(SearchResultSnippet {
                    category: intent.category,
                    source: "duckduckgo".to_string(),
                    title: text.clone(),
                    snippet: text,
                    url,
                    sentiment: Sentiment::Neutral,
                })
            })
            .take(MAX_RESULTS)
            .collect();

        let payload = serde_json::to_value(&snippets).map_err(|e| VigilError::InternalError(e.to_string()))?;
        self.repository.cache_set_with_ttl(&key, payload.clone(), cache::SEARCH_TTL_SECONDS, "duckduckgo").await?;

        Ok((
            SourceResultEnvelope {
                source: "duckduckgo".to_string(),
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
