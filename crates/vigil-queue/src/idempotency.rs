//! Fast-path duplicate-delivery guard (testable property 5, spec §8:
//! "duplicate delivery of the same task_id within 60 seconds produces at
//! most one StoredReport"). This is a best-effort, single-process layer in
//! front of the workflow — the authoritative guarantee comes from the
//! workflow being idempotent on `task_id` against the threads space; this
//! guard just avoids redundant work within one consumer process.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(60);

pub struct IdempotencyGuard {
    seen: DashMap<String, Instant>,
    window: Duration,
}

impl IdempotencyGuard {
    pub fn new(window: Duration) -> Self {
        Self { seen: DashMap::new(), window }
    }

    /// Returns `true` the first time `task_id` is seen within the window,
    /// `false` on a duplicate seen before the window elapses.
    pub fn mark_seen(&self, task_id: &str) -> bool {
        let now = Instant::now();
        if let Some(entry) = self.seen.get(task_id) {
            if now.duration_since(*entry) < self.window {
                return false;
            }
        }
        self.seen.insert(task_id.to_string(), now);
        true
    }

    /// Drops entries older than the window; intended to run alongside the
    /// storage layer's own background eviction.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.window);
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new(IDEMPOTENCY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_accepted() {
        let guard = IdempotencyGuard::default();
        assert!(guard.mark_seen("task-1"));
    }

    #[test]
    fn duplicate_within_window_is_rejected() {
        let guard = IdempotencyGuard::default();
        assert!(guard.mark_seen("task-1"));
        assert!(!guard.mark_seen("task-1"));
    }

    #[test]
    fn distinct_tasks_are_independent() {
        let guard = IdempotencyGuard::default();
        assert!(guard.mark_seen("task-1"));
        assert!(guard.mark_seen("task-2"));
    }
}
