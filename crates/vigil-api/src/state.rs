//! Shared application state (spec §9's "explicit service context" redesign
//! note, extended to the REST surface): every handler receives the same
//! `Arc`-backed handles constructed once at startup, mirroring
//! [`vigil_core::workflow::WorkflowDeps`] one layer up.

use crate::rate_limit::ApiRateLimiter;
use dashmap::DashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vigil_core::workflow::{WorkflowConfig, WorkflowDeps};
use vigil_http::HttpCore;
use vigil_queue::QueuePublisher;

/// Tracks in-flight synchronous/streaming sessions so
/// `DELETE /agent/analyze/{session_id}` can flip a running session's
/// cancellation flag (spec §5). Entries are removed once the run finishes;
/// a `session_id` absent from this map is either unknown or already
/// terminal, and both cases return the same 404.
#[derive(Default)]
pub struct SessionRegistry {
    flags: DashMap<String, Arc<AtomicBool>>,
}

impl SessionRegistry {
    pub fn register(&self, session_id: String) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.insert(session_id, flag.clone());
        flag
    }

    pub fn unregister(&self, session_id: &str) {
        self.flags.remove(session_id);
    }

    /// Returns `true` if a running session with this id was found and
    /// signalled; `false` if it is unknown (never started, or already
    /// finished).
    pub fn cancel(&self, session_id: &str) -> bool {
        if let Some(flag) = self.flags.get(session_id) {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<WorkflowDeps>,
    pub workflow_config: Arc<WorkflowConfig>,
    pub http: Arc<HttpCore>,
    pub metrics_registry: Arc<prometheus::Registry>,
    /// `None` when the queue runtime isn't configured for this process;
    /// `POST /agent/analyze-client/async` then returns `StorageUnavailable`
    /// rather than panicking (the sync/stream routes never need this).
    pub queue_publisher: Option<Arc<QueuePublisher>>,
    pub sessions: Arc<SessionRegistry>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub admin_token: Arc<String>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deps: Arc<WorkflowDeps>,
        workflow_config: Arc<WorkflowConfig>,
        http: Arc<HttpCore>,
        metrics_registry: Arc<prometheus::Registry>,
        queue_publisher: Option<Arc<QueuePublisher>>,
        admin_token: String,
    ) -> Self {
        Self {
            deps,
            workflow_config,
            http,
            metrics_registry,
            queue_publisher,
            sessions: Arc::new(SessionRegistry::default()),
            rate_limiter: Arc::new(ApiRateLimiter::new()),
            admin_token: Arc::new(admin_token),
        }
    }
}
