//! Resilient HTTP client: wraps `reqwest` with per-host circuit breaking,
//! retry with backoff, and metrics — the orchestration component described
//! in spec §4.1. Collector clients (registry/court/analytics/search) call
//! through this rather than talking to `reqwest` directly.

use crate::circuit_breaker::{Admission, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::error::{HttpCoreError, Result};
use crate::retry::{backoff_delay, is_retryable_status, RetryConfig};
use crate::{metrics, pagination};
use reqwest::Method;
use std::time::{Duration, Instant};
use vigil_core::model::CircuitState;

/// Default connect timeout, matching the teacher's provider crates.
pub const DEFAULT_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default whole-request timeout, matching the teacher's provider crates.
pub const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Extra headers applied to every attempt, e.g. provider bearer tokens
    /// the LLM cascade needs (spec §2: "one LLM gateway ... built on the
    /// HTTP core").
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_REQUEST_TIMEOUT,
            retry: RetryConfig::default(),
            headers: Vec::new(),
        }
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Number of retries the core performed before this response was
    /// obtained, surfaced so callers can annotate `SourceResultEnvelope`.
    pub retries: u32,
}

impl HttpResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpCoreError::Decode(e.to_string()))
    }
}

/// Shared resilient HTTP core, one per process, used by every outbound
/// provider client.
pub struct HttpCore {
    client: reqwest::Client,
    breakers: CircuitBreakerRegistry,
}

impl HttpCore {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_REQUEST_TIMEOUT)
            .connect_timeout(DEFAULT_HTTP_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            breakers: CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        }
    }

    /// Derives the host key a given URL is tracked under (authority only),
    /// so callers can look up circuit state for a URL before/after calling.
    pub fn host_key(url: &str) -> String {
        reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string())
    }

    pub fn circuit_state(&self, host_key: &str) -> CircuitState {
        self.breakers.state(host_key)
    }

    pub fn reset_circuit(&self, host_key: &str) {
        self.breakers.reset(host_key);
    }

    /// Per-host circuit state for every host seen so far, for
    /// `GET /utility/circuit-breakers`.
    pub fn circuit_snapshot(&self) -> Vec<(String, CircuitState)> {
        self.breakers.snapshot()
    }

    /// Issues a request with circuit breaking, retry, and metrics applied.
    /// `body` is sent as JSON when present.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        opts: &RequestOptions,
    ) -> Result<HttpResponse> {
        let host = Self::host_key(url);

        let admission = self.breakers.admit(&host);
        if matches!(admission, Admission::Rejected) {
            return Err(HttpCoreError::CircuitOpen(host));
        }

        let mut last_err: Option<HttpCoreError> = None;
        let mut retries = 0u32;

        for attempt in 0..=opts.retry.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(&opts.retry, attempt - 1);
                tokio::time::sleep(delay).await;
                retries += 1;
                metrics::record_retry(&host);
            }

            let start = Instant::now();
            let mut req = self.client.request(method.clone(), url).timeout(opts.timeout);
            for (name, value) in &opts.headers {
                req = req.header(name, value);
            }
            if let Some(b) = body {
                req = req.json(b);
            }

            let outcome = tokio::time::timeout(opts.timeout, req.send()).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Err(_) => {
                    last_err = Some(HttpCoreError::Timeout { url: url.to_string(), elapsed: start.elapsed() });
                    metrics::record_request(&host, false, elapsed_ms);
                    continue;
                }
                Ok(Err(source)) => {
                    last_err = Some(HttpCoreError::Transport { url: url.to_string(), source });
                    metrics::record_request(&host, false, elapsed_ms);
                    continue;
                }
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    if status == 429 {
                        metrics::record_request(&host, false, elapsed_ms);
                        if attempt < opts.retry.max_retries {
                            last_err = Some(HttpCoreError::RateLimited(host.clone()));
                            continue;
                        }
                        self.on_failure(&host);
                        return Err(HttpCoreError::RateLimited(host));
                    }
                    if is_retryable_status(status) && attempt < opts.retry.max_retries {
                        last_err = Some(HttpCoreError::UpstreamStatus {
                            url: url.to_string(),
                            status,
                            body: String::new(),
                        });
                        metrics::record_request(&host, false, elapsed_ms);
                        continue;
                    }

                    let body_bytes = response.bytes().await.map_err(|source| HttpCoreError::Transport {
                        url: url.to_string(),
                        source,
                    })?;
                    let body_bytes = body_bytes.to_vec();

                    if status >= 400 {
                        metrics::record_request(&host, false, elapsed_ms);
                        self.on_failure(&host);
                        return Err(HttpCoreError::UpstreamStatus {
                            url: url.to_string(),
                            status,
                            body: String::from_utf8_lossy(&body_bytes).into_owned(),
                        });
                    }

                    metrics::record_request(&host, true, elapsed_ms);
                    self.on_success(&host);
                    return Ok(HttpResponse { status, body: body_bytes, retries });
                }
            }
        }

        self.on_failure(&host);
        let _ = retries;
        Err(last_err.unwrap_or_else(|| {
            HttpCoreError::RetriesExhausted(format!("no successful response from {url}"))
        }))
    }

    fn on_success(&self, host: &str) {
        self.breakers.on_success(host);
        metrics::record_circuit_transition(host, "closed");
    }

    fn on_failure(&self, host: &str) {
        self.breakers.on_failure(host);
        let state = match self.breakers.state(host) {
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Closed => "closed",
        };
        metrics::record_circuit_transition(host, state);
    }

    /// Fetches every page of a cursor-paginated endpoint (spec §4.1),
    /// via [`pagination::fetch_all_pages`].
    pub async fn fetch_all_pages<T, F>(
        &self,
        mut build_url: F,
    ) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
        F: FnMut(Option<String>) -> (String, Option<serde_json::Value>),
    {
        pagination::fetch_all_pages(|cursor| {
            let (url, body) = build_url(cursor);
            async move {
                let resp = self.request(Method::GET, &url, body.as_ref(), &RequestOptions::default()).await?;
                let parsed: PageEnvelope<T> = resp.json()?;
                Ok(pagination::Page { items: parsed.items, next_cursor: parsed.next_cursor })
            }
        })
        .await
    }
}

impl Default for HttpCore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct PageEnvelope<T> {
    items: Vec<T>,
    next_cursor: Option<String>,
}
