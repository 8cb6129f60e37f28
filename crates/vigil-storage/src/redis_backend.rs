//! Redis-backed primary repository (spec §4.2). Keys follow the teacher's
//! `dashflow-redis-checkpointer` layout: a colon-delimited prefix per space
//! plus sorted-set/set secondary indexes so indexed lookups never fall back
//! to a full scan.

use crate::compression::{decode, encode};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use vigil_core::model::{CacheEntry, StoredReport, ThreadRecord};
use vigil_core::traits::{EvictionCounts, ReportFilter, Repository, StorageStats};
use vigil_core::{Result, VigilError};

#[derive(Default)]
struct SpaceCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    compressed_saves: AtomicU64,
    bytes_saved: AtomicU64,
}

/// Primary storage backend. Stores `{space}:{key}` hashes plus a
/// `{space}:index:*` set of index structures (per-INN sets, an expiry
/// sorted-set) so `cleanup_expired`/`get_reports_by_inn` use index
/// iterators rather than `KEYS`/`SCAN` over the whole space.
pub struct RedisRepository {
    conn: ConnectionManager,
    key_prefix: String,
    cache_counters: SpaceCounters,
    report_counters: SpaceCounters,
}

impl RedisRepository {
    pub async fn connect(connection_string: &str) -> std::result::Result<Self, StorageError> {
        Self::connect_with_prefix(connection_string, "vigil").await
    }

    pub async fn connect_with_prefix(
        connection_string: &str,
        key_prefix: &str,
    ) -> std::result::Result<Self, StorageError> {
        let client = redis::Client::open(connection_string)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        debug!(prefix = key_prefix, "connected to Redis storage backend");
        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
            cache_counters: SpaceCounters::default(),
            report_counters: SpaceCounters::default(),
        })
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}:cache:{}", self.key_prefix, key)
    }
    fn cache_expiry_index(&self) -> String {
        format!("{}:cache:index:expiry", self.key_prefix)
    }
    fn report_key(&self, report_id: &str) -> String {
        format!("{}:reports:{}", self.key_prefix, report_id)
    }
    fn report_expiry_index(&self) -> String {
        format!("{}:reports:index:expiry", self.key_prefix)
    }
    fn report_inn_index(&self, inn: &str) -> String {
        format!("{}:reports:index:inn:{}", self.key_prefix, inn)
    }
    fn reports_all_index(&self) -> String {
        format!("{}:reports:index:all", self.key_prefix)
    }
    fn thread_key(&self, thread_id: &str) -> String {
        format!("{}:threads:{}", self.key_prefix, thread_id)
    }
    fn thread_inn_index(&self, inn: &str) -> String {
        format!("{}:threads:index:inn:{}", self.key_prefix, inn)
    }
    fn threads_all_index(&self) -> String {
        format!("{}:threads:index:all", self.key_prefix)
    }

    async fn encode_value(&self, value: &[u8]) -> Result<(Vec<u8>, bool)> {
        let encoded = encode(value).map_err(VigilError::from)?;
        if encoded.compressed {
            self.cache_counters.compressed_saves.fetch_add(1, Ordering::Relaxed);
            self.cache_counters
                .bytes_saved
                .fetch_add((value.len() - encoded.bytes.len()) as u64, Ordering::Relaxed);
        }
        Ok((encoded.bytes, encoded.compressed))
    }
}

fn redis_err(e: redis::RedisError) -> VigilError {
    StorageError::from(e).into()
}

#[async_trait]
impl Repository for RedisRepository {
    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<(Vec<u8>, bool)> = {
            let redis_key = self.cache_key(key);
            let (data, compressed): (Option<Vec<u8>>, Option<i64>) = redis::pipe()
                .hget(&redis_key, "data")
                .hget(&redis_key, "compressed")
                .query_async(&mut conn)
                .await
                .map_err(redis_err)?;
            data.map(|d| (d, compressed.unwrap_or(0) != 0))
        };

        match raw {
            Some((data, compressed)) => {
                let decoded = decode(&data, compressed).map_err(VigilError::from)?;
                let entry: CacheEntry =
                    serde_json::from_slice(&decoded).map_err(|e| VigilError::InternalError(e.to_string()))?;
                let now = Utc::now().timestamp();
                if entry.is_observable(now) {
                    self.cache_counters.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(entry))
                } else {
                    let _: () = conn.del(self.cache_key(key)).await.map_err(redis_err)?;
                    self.cache_counters.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            }
            None => {
                self.cache_counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn cache_set_with_ttl(&self, key: &str, value: serde_json::Value, ttl_seconds: i64, source: &str) -> Result<()> {
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            ttl_epoch_seconds: now.timestamp() + ttl_seconds,
            created_at: now,
            source: source.to_string(),
        };
        let serialized = serde_json::to_vec(&entry).map_err(|e| VigilError::InternalError(e.to_string()))?;
        let (bytes, compressed) = self.encode_value(&serialized).await?;

        let mut conn = self.conn.clone();
        let redis_key = self.cache_key(key);
        let _: () = redis::pipe()
            .hset(&redis_key, "data", bytes)
            .ignore()
            .hset(&redis_key, "compressed", compressed as i64)
            .ignore()
            .expire(&redis_key, ttl_seconds.max(1))
            .ignore()
            .zadd(self.cache_expiry_index(), &redis_key, entry.ttl_epoch_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn cache_clear_prefix(&self, prefix: &str) -> Result<u64> {
        use futures::TryStreamExt;
        let mut conn = self.conn.clone();
        let pattern = format!("{}:cache:{}*", self.key_prefix, prefix);
        let mut iter: redis::AsyncIter<String> = conn
            .scan_match(&pattern)
            .await
            .map_err(redis_err)?;
        let mut keys = Vec::new();
        while let Some(key) = iter.try_next().await.map_err(redis_err)? {
            keys.push(key);
        }
        drop(iter);
        if keys.is_empty() {
            return Ok(0);
        }
        let _: () = conn.del(&keys).await.map_err(redis_err)?;
        let _: () = conn.zrem(self.cache_expiry_index(), &keys).await.map_err(redis_err)?;
        Ok(keys.len() as u64)
    }

    async fn save_report(&self, report: StoredReport) -> Result<()> {
        let serialized = serde_json::to_vec(&report).map_err(|e| VigilError::InternalError(e.to_string()))?;
        let (bytes, compressed) = self.encode_value(&serialized).await?;

        let mut conn = self.conn.clone();
        let redis_key = self.report_key(&report.report_id);
        let mut pipe = redis::pipe();
        pipe.hset(&redis_key, "data", bytes)
            .ignore()
            .hset(&redis_key, "compressed", compressed as i64)
            .ignore()
            .zadd(self.report_expiry_index(), &redis_key, report.expires_at.timestamp())
            .ignore()
            .sadd(self.reports_all_index(), &redis_key)
            .ignore();
        if let Some(inn) = &report.inn {
            pipe.sadd(self.report_inn_index(inn), &redis_key).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(())
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<StoredReport>> {
        match self.load_report(&self.report_key(report_id)).await? {
            Some(r) if r.expires_at > Utc::now() => {
                self.report_counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(r))
            }
            Some(r) => {
                self.delete_report(&r.report_id).await?;
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
        let mut conn = self.conn.clone();
        let redis_key = self.report_key(report_id);
        let existing = self.load_report(&redis_key).await?;
        if existing.is_none() {
            return Ok(false);
        }
        let mut pipe = redis::pipe();
        pipe.del(&redis_key)
            .ignore()
            .zrem(self.report_expiry_index(), &redis_key)
            .ignore()
            .srem(self.reports_all_index(), &redis_key)
            .ignore();
        if let Some(inn) = existing.and_then(|r| r.inn) {
            pipe.srem(self.report_inn_index(&inn), &redis_key).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(true)
    }

    async fn list_reports(&self, filter: &ReportFilter, limit: u32, offset: u32) -> Result<Vec<StoredReport>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = if let Some(inn) = &filter.inn {
            conn.smembers(self.report_inn_index(inn)).await.map_err(redis_err)?
        } else {
            conn.smembers(self.reports_all_index()).await.map_err(redis_err)?
        };

        let mut reports = Vec::new();
        for key in keys {
            if let Some(r) = self.load_report(&key).await? {
                if matches_filter(&r, filter) {
                    reports.push(r);
                }
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn get_reports_by_inn(&self, inn: &str) -> Result<Vec<StoredReport>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.smembers(self.report_inn_index(inn)).await.map_err(redis_err)?;
        let mut reports = Vec::new();
        for key in keys {
            if let Some(r) = self.load_report(&key).await? {
                reports.push(r);
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn save_thread(&self, thread: ThreadRecord) -> Result<()> {
        let serialized = serde_json::to_vec(&thread).map_err(|e| VigilError::InternalError(e.to_string()))?;
        let (bytes, compressed) = self.encode_value(&serialized).await?;

        let mut conn = self.conn.clone();
        let redis_key = self.thread_key(&thread.thread_id);
        let mut pipe = redis::pipe();
        pipe.hset(&redis_key, "data", bytes)
            .ignore()
            .hset(&redis_key, "compressed", compressed as i64)
            .ignore()
            .sadd(self.threads_all_index(), &redis_key)
            .ignore();
        if let Some(inn) = &thread.inn {
            pipe.sadd(self.thread_inn_index(inn), &redis_key).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        self.load_thread(&self.thread_key(thread_id)).await
    }

    async fn list_threads(&self, limit: u32, offset: u32) -> Result<Vec<ThreadRecord>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.smembers(self.threads_all_index()).await.map_err(redis_err)?;
        let mut threads = Vec::new();
        for key in keys {
            if let Some(t) = self.load_thread(&key).await? {
                threads.push(t);
            }
        }
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn list_threads_by_inn(&self, inn: &str) -> Result<Vec<ThreadRecord>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.smembers(self.thread_inn_index(inn)).await.map_err(redis_err)?;
        let mut threads = Vec::new();
        for key in keys {
            if let Some(t) = self.load_thread(&key).await? {
                threads.push(t);
            }
        }
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }

    async fn cleanup_expired(&self) -> Result<EvictionCounts> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();

        let expired_cache_keys: Vec<String> = conn
            .zrangebyscore(self.cache_expiry_index(), i64::MIN, now)
            .await
            .map_err(redis_err)?;
        if !expired_cache_keys.is_empty() {
            let _: () = conn.del(&expired_cache_keys).await.map_err(redis_err)?;
            let _: () = conn.zrem(self.cache_expiry_index(), &expired_cache_keys).await.map_err(redis_err)?;
        }

        let expired_report_keys: Vec<String> = conn
            .zrangebyscore(self.report_expiry_index(), i64::MIN, now)
            .await
            .map_err(redis_err)?;
        if !expired_report_keys.is_empty() {
            let mut expired_inns: Vec<(String, String)> = Vec::new();
            for key in &expired_report_keys {
                if let Some(r) = self.load_report(key).await? {
                    if let Some(inn) = r.inn {
                        expired_inns.push((inn, key.clone()));
                    }
                }
            }

            let _: () = conn.del(&expired_report_keys).await.map_err(redis_err)?;
            let _: () = conn.zrem(self.report_expiry_index(), &expired_report_keys).await.map_err(redis_err)?;
            let _: () = conn.srem(self.reports_all_index(), &expired_report_keys).await.map_err(redis_err)?;
            for (inn, key) in &expired_inns {
                let _: () = conn.srem(self.report_inn_index(inn), key).await.map_err(redis_err)?;
            }
        }

        if !expired_cache_keys.is_empty() || !expired_report_keys.is_empty() {
            warn!(
                cache_evicted = expired_cache_keys.len(),
                reports_evicted = expired_report_keys.len(),
                "background eviction swept expired entries"
            );
        }

        Ok(EvictionCounts {
            cache_evicted: expired_cache_keys.len() as u64,
            reports_evicted: expired_report_keys.len() as u64,
        })
    }

    async fn get_stats(&self) -> Result<BTreeMap<String, StorageStats>> {
        let mut conn = self.conn.clone();
        let cache_count: u64 = conn.zcard(self.cache_expiry_index()).await.unwrap_or(0);
        let report_count: u64 = conn.scard(self.reports_all_index()).await.unwrap_or(0);

        let mut stats = BTreeMap::new();
        stats.insert("cache".to_string(), space_stats(&self.cache_counters, cache_count));
        stats.insert("reports".to_string(), space_stats(&self.report_counters, report_count));
        Ok(stats)
    }

    fn is_fallback(&self) -> bool {
        false
    }
}

impl RedisRepository {
    async fn load_hash_data(&self, redis_key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let (data, compressed): (Option<Vec<u8>>, Option<i64>) = redis::pipe()
            .hget(redis_key, "data")
            .hget(redis_key, "compressed")
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        match data {
            Some(d) => Ok(Some(decode(&d, compressed.unwrap_or(0) != 0).map_err(VigilError::from)?)),
            None => Ok(None),
        }
    }

    async fn load_report(&self, redis_key: &str) -> Result<Option<StoredReport>> {
        let Some(decoded) = self.load_hash_data(redis_key).await? else { return Ok(None) };
        let report: StoredReport =
            serde_json::from_slice(&decoded).map_err(|e| VigilError::InternalError(e.to_string()))?;
        Ok(Some(report))
    }

    async fn load_thread(&self, redis_key: &str) -> Result<Option<ThreadRecord>> {
        let Some(decoded) = self.load_hash_data(redis_key).await? else { return Ok(None) };
        let thread: ThreadRecord =
            serde_json::from_slice(&decoded).map_err(|e| VigilError::InternalError(e.to_string()))?;
        Ok(Some(thread))
    }
}

fn matches_filter(report: &StoredReport, filter: &ReportFilter) -> bool {
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
