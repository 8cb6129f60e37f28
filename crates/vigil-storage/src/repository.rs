//! Failover wrapper: tries the Redis-backed primary, falls back to the
//! in-memory repository when the primary becomes unreachable (spec §4.2).
//! The switch is one-way for the life of the process — once the primary
//! has failed it is not retried, matching the teacher's Redis rate
//! limiter's "fall back to local token bucket" posture in
//! `dashflow-streaming::rate_limiter`.

use crate::memory::InMemoryRepository;
use crate::redis_backend::RedisRepository;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use vigil_core::model::{CacheEntry, StoredReport, ThreadRecord};
use vigil_core::traits::{EvictionCounts, ReportFilter, Repository, StorageStats};
use vigil_core::{Result, VigilError};

pub struct FailoverRepository {
    primary: Option<RedisRepository>,
    fallback: InMemoryRepository,
    using_fallback: AtomicBool,
}

impl FailoverRepository {
    pub fn with_primary(primary: RedisRepository) -> Self {
        Self {
            primary: Some(primary),
            fallback: InMemoryRepository::new(),
            using_fallback: AtomicBool::new(false),
        }
    }

    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            fallback: InMemoryRepository::new(),
            using_fallback: AtomicBool::new(true),
        }
    }

    fn is_using_fallback(&self) -> bool {
        self.primary.is_none() || self.using_fallback.load(Ordering::Acquire)
    }

    fn note_primary_failure(&self, err: &VigilError) {
        if matches!(err, VigilError::StorageUnavailable(_)) && !self.using_fallback.swap(true, Ordering::AcqRel) {
            warn!(error = %err, "primary storage backend unreachable; switching to in-memory fallback");
        }
    }
}

macro_rules! with_failover {
    ($self:expr, |$repo:ident| $body:expr) => {{
        if $self.is_using_fallback() {
            let $repo = &$self.fallback;
            $body
        } else {
            let $repo = $self.primary.as_ref().expect("checked by is_using_fallback");
            match $body {
                Ok(v) => Ok(v),
                Err(err) => {
                    $self.note_primary_failure(&err);
                    if $self.is_using_fallback() {
                        let $repo = &$self.fallback;
                        $body
                    } else {
                        Err(err)
                    }
                }
            }
        }
    }};
}

#[async_trait]
impl Repository for FailoverRepository {
    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        with_failover!(self, |repo| repo.cache_get(key).await)
    }

    async fn cache_set_with_ttl(&self, key: &str, value: serde_json::Value, ttl_seconds: i64, source: &str) -> Result<()> {
        with_failover!(self, |repo| repo.cache_set_with_ttl(key, value.clone(), ttl_seconds, source).await)
    }

    async fn cache_clear_prefix(&self, prefix: &str) -> Result<u64> {
        with_failover!(self, |repo| repo.cache_clear_prefix(prefix).await)
    }

    async fn save_report(&self, report: StoredReport) -> Result<()> {
        with_failover!(self, |repo| repo.save_report(report.clone()).await)
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<StoredReport>> {
        with_failover!(self, |repo| repo.get_report(report_id).await)
    }

    async fn delete_report(&self, report_id: &str) -> Result<bool> {
        with_failover!(self, |repo| repo.delete_report(report_id).await)
    }

    async fn list_reports(&self, filter: &ReportFilter, limit: u32, offset: u32) -> Result<Vec<StoredReport>> {
        with_failover!(self, |repo| repo.list_reports(filter, limit, offset).await)
    }

    async fn get_reports_by_inn(&self, inn: &str) -> Result<Vec<StoredReport>> {
        with_failover!(self, |repo| repo.get_reports_by_inn(inn).await)
    }

    async fn save_thread(&self, thread: ThreadRecord) -> Result<()> {
        with_failover!(self, |repo| repo.save_thread(thread.clone()).await)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        with_failover!(self, |repo| repo.get_thread(thread_id).await)
    }

    async fn list_threads(&self, limit: u32, offset: u32) -> Result<Vec<ThreadRecord>> {
        with_failover!(self, |repo| repo.list_threads(limit, offset).await)
    }

    async fn list_threads_by_inn(&self, inn: &str) -> Result<Vec<ThreadRecord>> {
        with_failover!(self, |repo| repo.list_threads_by_inn(inn).await)
    }

    async fn cleanup_expired(&self) -> Result<EvictionCounts> {
        with_failover!(self, |repo| repo.cleanup_expired().await)
    }

    async fn get_stats(&self) -> Result<BTreeMap<String, StorageStats>> {
        with_failover!(self, |repo| repo.get_stats().await)
    }

    fn is_fallback(&self) -> bool {
        self.is_using_fallback()
    }
}
