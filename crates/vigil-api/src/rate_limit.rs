//! Per-client-IP token-bucket rate limiting (spec §5, §6.1). Grounded on the
//! teacher's `dashflow-streaming::rate_limiter::TenantRateLimiter` — same
//! token-bucket math and bounded-growth pruning, scoped per IP instead of
//! per tenant and, deliberately, in-memory only: the teacher's Redis-backed
//! distributed mode has no counterpart here since `vigil-api` runs as a
//! single process (see DESIGN.md).

use crate::error::ApiError;
use axum::http::HeaderMap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Client identity for rate limiting: `X-Forwarded-For`'s first hop when
/// present (the expected deployment is behind a reverse proxy, matching the
/// teacher's `get_client_id` convention), else `"unknown"` so unidentified
/// clients still share a single bucket rather than bypassing limits.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
    }
    "unknown".to_string()
}

/// Maximum distinct IPs tracked per tier before the oldest are pruned.
const MAX_TRACKED_IPS: usize = 10_000;
const PRUNE_BATCH: usize = 1_000;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
    refill_rate: f64,
    last_access: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        let now = Instant::now();
        Self {
            capacity,
            tokens: capacity,
            last_refill: now,
            refill_rate,
            last_access: now,
        }
    }

    fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
        self.last_access = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Route classes named by their per-minute quota in spec §6.1's table,
/// rather than by route, since several routes share a quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTier {
    /// `POST /agent/analyze-client`, `POST /agent/analyze-client/async`: 5/min.
    Analyze,
    /// `GET /agent/threads`: 20/min.
    ThreadList,
    /// Most read/write routes: 30/min.
    Standard,
    /// Admin and utility routes: 60/min.
    Frequent,
}

impl RouteTier {
    fn per_minute(self) -> f64 {
        match self {
            RouteTier::Analyze => 5.0,
            RouteTier::ThreadList => 20.0,
            RouteTier::Standard => 30.0,
            RouteTier::Frequent => 60.0,
        }
    }
}

struct TierBuckets {
    buckets: DashMap<String, TokenBucket>,
    per_minute: f64,
}

impl TierBuckets {
    fn new(per_minute: f64) -> Self {
        Self { buckets: DashMap::new(), per_minute }
    }

    fn check(&self, ip: &str) -> bool {
        if !self.buckets.contains_key(ip) && self.buckets.len() >= MAX_TRACKED_IPS {
            let mut entries: Vec<(String, Instant)> =
                self.buckets.iter().map(|e| (e.key().clone(), e.value().last_access)).collect();
            entries.sort_by_key(|(_, access)| *access);
            for (key, _) in entries.into_iter().take(PRUNE_BATCH) {
                self.buckets.remove(&key);
            }
        }

        let mut bucket = self
            .buckets
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::new(self.per_minute, self.per_minute / 60.0));
        bucket.try_consume()
    }
}

/// Global cross-route caps from spec §5: "global: 100/min, 2000/h".
struct GlobalBuckets {
    per_minute: TierBuckets,
    per_hour: DashMap<String, TokenBucket>,
}

impl GlobalBuckets {
    fn new() -> Self {
        Self {
            per_minute: TierBuckets::new(100.0),
            per_hour: DashMap::new(),
        }
    }

    fn check(&self, ip: &str) -> bool {
        if !self.per_minute.check(ip) {
            return false;
        }
        if !self.per_hour.contains_key(ip) && self.per_hour.len() >= MAX_TRACKED_IPS {
            let mut entries: Vec<(String, Instant)> =
                self.per_hour.iter().map(|e| (e.key().clone(), e.value().last_access)).collect();
            entries.sort_by_key(|(_, access)| *access);
            for (key, _) in entries.into_iter().take(PRUNE_BATCH) {
                self.per_hour.remove(&key);
            }
        }
        let mut bucket = self
            .per_hour
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::new(2000.0, 2000.0 / 3600.0));
        bucket.try_consume()
    }
}

pub struct ApiRateLimiter {
    analyze: TierBuckets,
    thread_list: TierBuckets,
    standard: TierBuckets,
    frequent: TierBuckets,
    global: GlobalBuckets,
    rejections: AtomicU64,
}

impl ApiRateLimiter {
    pub fn new() -> Self {
        Self {
            analyze: TierBuckets::new(RouteTier::Analyze.per_minute()),
            thread_list: TierBuckets::new(RouteTier::ThreadList.per_minute()),
            standard: TierBuckets::new(RouteTier::Standard.per_minute()),
            frequent: TierBuckets::new(RouteTier::Frequent.per_minute()),
            global: GlobalBuckets::new(),
            rejections: AtomicU64::new(0),
        }
    }

    /// `true` if `ip` may proceed under both the route tier's quota and the
    /// global quota; consumes a token from both on success.
    pub fn check(&self, ip: &str, tier: RouteTier) -> bool {
        let tier_buckets = match tier {
            RouteTier::Analyze => &self.analyze,
            RouteTier::ThreadList => &self.thread_list,
            RouteTier::Standard => &self.standard,
            RouteTier::Frequent => &self.frequent,
        };
        let allowed = tier_buckets.check(ip) && self.global.check(ip);
        if !allowed {
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    pub fn rejection_count(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Convenience for handlers: `Err(ApiError::rate_limited(..))` on
    /// exceedance (spec §7: "429 to caller inbound").
    pub fn enforce(&self, headers: &HeaderMap, tier: RouteTier) -> Result<(), ApiError> {
        let ip = client_ip(headers);
        if self.check(&ip, tier) {
            Ok(())
        } else {
            Err(ApiError::rate_limited("rate limit exceeded"))
        }
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_tier_allows_five_then_rejects() {
        let limiter = ApiRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("1.2.3.4", RouteTier::Analyze));
        }
        assert!(!limiter.check("1.2.3.4", RouteTier::Analyze));
    }

    #[test]
    fn distinct_ips_get_independent_buckets() {
        let limiter = ApiRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("1.1.1.1", RouteTier::Analyze));
        }
        assert!(!limiter.check("1.1.1.1", RouteTier::Analyze));
        assert!(limiter.check("2.2.2.2", RouteTier::Analyze));
    }

    #[test]
    fn global_cap_binds_even_under_a_generous_tier() {
        let limiter = ApiRateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check("3.3.3.3", RouteTier::Frequent));
        }
        assert!(!limiter.check("3.3.3.3", RouteTier::Frequent));
    }
}
