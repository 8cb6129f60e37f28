//! Narrow contracts the orchestration core depends on, implemented by the
//! provider/llm/storage crates. Keeping these as traits here (rather than
//! `vigil-core` depending on its downstream crates) is what lets agents be
//! plain functions over `dyn` trait objects injected from a service context,
//! per spec §9's "explicit service context" redesign note.

use crate::error::Result;
use crate::model::{CacheEntry, RiskLevel, SearchIntent, SearchResultSnippet, SourceResultEnvelope, StoredReport, ThreadRecord};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Healthcheck: Send + Sync {
    /// Issues a minimal real request; used by `GET /utility/health?deep=true`.
    async fn healthcheck(&self, timeout: Duration) -> Result<()>;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait RegistryClient: Healthcheck {
    async fn lookup(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, RegistryRecord)>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RegistryRecord {
    pub status: Option<String>,
    pub sanctions_flag: bool,
    pub terrorist_list_flag: bool,
    pub tax_debt_flag: bool,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait CourtClient: Healthcheck {
    async fn search_cases(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, CourtRecord)>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CourtRecord {
    pub case_count: u32,
    pub recent_case_count: u32,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait AnalyticsClient: Healthcheck {
    async fn analyze(&self, client_name: &str, inn: Option<&str>) -> Result<(SourceResultEnvelope, AnalyticsRecord)>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalyticsRecord {
    pub bankruptcy_flag: bool,
    pub negative_flags: u32,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait SearchClient: Healthcheck {
    async fn search(
        &self,
        intent: &SearchIntent,
        client_name: &str,
    ) -> Result<(SourceResultEnvelope, Vec<SearchResultSnippet>)>;
}

/// One LLM provider in the cascade (spec §4.4). `vigil-llm` implements this
/// once per backend (OpenRouter, HuggingFace, GigaChat, YandexGPT) and drives
/// them in fixed order.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Whether this provider is configured (has credentials); unconfigured
    /// providers are skipped rather than attempted.
    fn is_configured(&self) -> bool;
    async fn generate_text(&self, prompt: &str, timeout: Duration) -> Result<String>;
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value>;
}

/// Telemetry emitted per LLM cascade call (spec §4.4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct LlmCallTelemetry {
    pub provider_used: String,
    pub fallback_depth: usize,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub inn: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub client_name: Option<String>,
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    pub date_to: Option<chrono::DateTime<chrono::Utc>>,
    pub min_risk_score: Option<u8>,
    pub max_risk_score: Option<u8>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageStats {
    pub count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub compressed_saves: u64,
    pub bytes_saved: u64,
}

/// The storage-layer Repository abstraction (spec §4.2). One implementation
/// covers all three spaces (cache/reports/threads); the primary backend and
/// the in-memory fallback both implement this same trait so callers never
/// branch on which is active.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn cache_set_with_ttl(&self, key: &str, value: serde_json::Value, ttl_seconds: i64, source: &str) -> Result<()>;
    async fn cache_clear_prefix(&self, prefix: &str) -> Result<u64>;

    async fn save_report(&self, report: StoredReport) -> Result<()>;
    async fn get_report(&self, report_id: &str) -> Result<Option<StoredReport>>;
    async fn delete_report(&self, report_id: &str) -> Result<bool>;
    async fn list_reports(&self, filter: &ReportFilter, limit: u32, offset: u32) -> Result<Vec<StoredReport>>;
    async fn get_reports_by_inn(&self, inn: &str) -> Result<Vec<StoredReport>>;

    async fn save_thread(&self, thread: ThreadRecord) -> Result<()>;
    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>>;
    async fn list_threads(&self, limit: u32, offset: u32) -> Result<Vec<ThreadRecord>>;
    async fn list_threads_by_inn(&self, inn: &str) -> Result<Vec<ThreadRecord>>;

    /// Sweeps expired cache/report rows; returns counts per space. Called by
    /// the hourly background eviction task and directly by tests.
    async fn cleanup_expired(&self) -> Result<EvictionCounts>;

    async fn get_stats(&self) -> Result<std::collections::BTreeMap<String, StorageStats>>;

    /// Whether this repository is the in-memory fallback (affects
    /// `GET /utility/health`'s `storage_backend` field).
    fn is_fallback(&self) -> bool;
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EvictionCounts {
    pub cache_evicted: u64,
    pub reports_evicted: u64,
}
