//! In-memory fallback repository, used when the primary Redis backend is
//! unreachable at startup or falls over mid-session. Grounded in the
//! teacher's `dashmap`-backed in-memory checkpointer idiom (see
//! `dashflow`'s `MemoryCheckpointer`): concurrent maps, no external
//! dependency, data lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use vigil_core::model::{CacheEntry, StoredReport, ThreadRecord};
use vigil_core::traits::{EvictionCounts, ReportFilter, Repository, StorageStats};
use vigil_core::Result;

#[derive(Default)]
struct SpaceCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    compressed_saves: AtomicU64,
    bytes_saved: AtomicU64,
}

pub struct InMemoryRepository {
    cache: DashMap<String, CacheEntry>,
    reports: DashMap<String, StoredReport>,
    threads: DashMap<String, ThreadRecord>,
    cache_counters: SpaceCounters,
    report_counters: SpaceCounters,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            reports: DashMap::new(),
            threads: DashMap::new(),
            cache_counters: SpaceCounters::default(),
            report_counters: SpaceCounters::default(),
        }
    }

    fn matches_filter(report: &StoredReport, filter: &ReportFilter) -> bool {
        if let Some(inn) = &filter.inn {
            if report.inn.as_deref() != Some(inn.as_str()) {
                return false;
            }
        }
        if let Some(level) = filter.risk_level {
            if report.risk_level != level {
                return false;
            }
        }
        if let Some(name) = &filter.client_name {
            if !report.client_name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(from) = filter.date_from {
            if report.created_at < from {
                return false;
            }
        }
        if let Some(to) = filter.date_to {
            if report.created_at > to {
                return false;
            }
        }
        if let Some(min) = filter.min_risk_score {
            if report.risk_score < min {
                return false;
            }
        }
        if let Some(max) = filter.max_risk_score {
            if report.risk_score > max {
                return false;
            }
        }
        true
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = Utc::now().timestamp();
        match self.cache.get(key) {
            Some(entry) if entry.is_observable(now) => {
                self.cache_counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.clone()))
            }
            Some(_) => {
                self.cache.remove(key);
                self.cache_counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.cache_counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn cache_set_with_ttl(&self, key: &str, value: serde_json::Value, ttl_seconds: i64, source: &str) -> Result<()> {
        let now = Utc::now();
        self.cache.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                ttl_epoch_seconds: now.timestamp() + ttl_seconds,
                created_at: now,
                source: source.to_string(),
            },
        );
        Ok(())
    }

    async fn cache_clear_prefix(&self, prefix: &str) -> Result<u64> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|kv| kv.key().starts_with(prefix))
            .map(|kv| kv.key().clone())
            .collect();
        for key in &keys {
            self.cache.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn save_report(&self, report: StoredReport) -> Result<()> {
        self.reports.insert(report.report_id.clone(), report);
        Ok(())
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<StoredReport>> {
        let now = Utc::now();
        match self.reports.get(report_id) {
            Some(r) if r.expires_at > now => {
                self.report_counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(r.clone()))
            }
            Some(_) => {
                self.reports.remove(report_id);
                self.report_counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.report_counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn delete_report(&self, report_id: &str) -> Result<bool> {
        Ok(self.reports.remove(report_id).is_some())
    }

    async fn list_reports(&self, filter: &ReportFilter, limit: u32, offset: u32) -> Result<Vec<StoredReport>> {
        let mut matches: Vec<StoredReport> = self
            .reports
            .iter()
            .map(|kv| kv.value().clone())
            .filter(|r| Self::matches_filter(r, filter))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn get_reports_by_inn(&self, inn: &str) -> Result<Vec<StoredReport>> {
        let mut matches: Vec<StoredReport> = self
            .reports
            .iter()
            .map(|kv| kv.value().clone())
            .filter(|r| r.inn.as_deref() == Some(inn))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn save_thread(&self, thread: ThreadRecord) -> Result<()> {
        self.threads.insert(thread.thread_id.clone(), thread);
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        Ok(self.threads.get(thread_id).map(|t| t.clone()))
    }

    async fn list_threads(&self, limit: u32, offset: u32) -> Result<Vec<ThreadRecord>> {
        let mut all: Vec<ThreadRecord> = self.threads.iter().map(|kv| kv.value().clone()).collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn list_threads_by_inn(&self, inn: &str) -> Result<Vec<ThreadRecord>> {
        let mut matches: Vec<ThreadRecord> = self
            .threads
            .iter()
            .map(|kv| kv.value().clone())
            .filter(|t| t.inn.as_deref() == Some(inn))
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }

    async fn cleanup_expired(&self) -> Result<EvictionCounts> {
        let now = Utc::now();
        let now_epoch = now.timestamp();

        let expired_cache: Vec<String> = self
            .cache
            .iter()
            .filter(|kv| !kv.value().is_observable(now_epoch))
            .map(|kv| kv.key().clone())
            .collect();
        for key in &expired_cache {
            self.cache.remove(key);
        }

        let expired_reports: Vec<String> = self
            .reports
            .iter()
            .filter(|kv| kv.value().expires_at < now)
            .map(|kv| kv.key().clone())
            .collect();
        for key in &expired_reports {
            self.reports.remove(key);
        }

        Ok(EvictionCounts {
            cache_evicted: expired_cache.len() as u64,
            reports_evicted: expired_reports.len() as u64,
        })
    }

    async fn get_stats(&self) -> Result<BTreeMap<String, StorageStats>> {
        let mut stats = BTreeMap::new();
        stats.insert("cache".to_string(), space_stats(&self.cache_counters, self.cache.len() as u64));
        stats.insert("reports".to_string(), space_stats(&self.report_counters, self.reports.len() as u64));
        Ok(stats)
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

fn space_stats(counters: &SpaceCounters, count: u64) -> StorageStats {
    let hits = counters.hits.load(Ordering::Relaxed);
    let misses = counters.misses.load(Ordering::Relaxed);
    let total = hits + misses;
    StorageStats {
        count,
        hits,
        misses,
        hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        compressed_saves: counters.compressed_saves.load(Ordering::Relaxed),
        bytes_saved: counters.bytes_saved.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::model::{ClientAnalysisReport, ReportMetadata, RiskAssessment, RiskLevel};

    fn sample_report(client_name: &str, inn: Option<&str>) -> StoredReport {
        StoredReport::new(
            client_name.to_string(),
            inn.map(str::to_string),
            ClientAnalysisReport {
                metadata: ReportMetadata {
                    client_name: client_name.to_string(),
                    inn: inn.map(str::to_string),
                    analysis_date: Utc::now(),
                    sources_used: vec![],
                },
                company_info: serde_json::json!({}),
                legal_cases_count: 0,
                risk_assessment: RiskAssessment { score: 10, level: RiskLevel::Low, factors: vec![] },
                findings: vec![],
                summary: String::new(),
                citations: vec![],
                recommendations: vec![],
                degraded: false,
            },
        )
    }

    #[tokio::test]
    async fn cache_roundtrip_and_expiry() {
        let repo = InMemoryRepository::new();
        repo.cache_set_with_ttl("k", serde_json::json!(42), 3600, "test").await.unwrap();
        let got = repo.cache_get("k").await.unwrap();
        assert_eq!(got.unwrap().value, serde_json::json!(42));

        repo.cache_set_with_ttl("expired", serde_json::json!(1), -10, "test").await.unwrap();
        assert!(repo.cache_get("expired").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_expired_removes_stale_entries() {
        let repo = InMemoryRepository::new();
        repo.cache_set_with_ttl("stale", serde_json::json!(1), -10, "test").await.unwrap();
        let counts = repo.cleanup_expired().await.unwrap();
        assert_eq!(counts.cache_evicted, 1);
    }

    #[tokio::test]
    async fn reports_by_inn_filters_exactly() {
        let repo = InMemoryRepository::new();
        repo.save_report(sample_report("Acme", Some("7736050003"))).await.unwrap();
        repo.save_report(sample_report("Other", Some("1234567890"))).await.unwrap();
        let found = repo.get_reports_by_inn("7736050003").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].client_name, "Acme");
    }

    #[tokio::test]
    async fn client_name_filter_is_case_insensitive_substring() {
        let repo = InMemoryRepository::new();
        repo.save_report(sample_report("Acme Holdings LLC", None)).await.unwrap();
        let filter = ReportFilter { client_name: Some("acme".to_string()), ..Default::default() };
        let found = repo.list_reports(&filter, 10, 0).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn is_fallback_is_true() {
        let repo = InMemoryRepository::new();
        assert!(repo.is_fallback());
    }
}
