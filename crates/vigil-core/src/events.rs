//! Typed event bus (spec §4.6): every workflow transition emits one of these
//! to any subscriber (SSE adapter, thread store, metrics). Modeled as a
//! bounded broadcast channel so a slow SSE subscriber cannot stall the
//! state machine (spec §9's "generator-based streaming" redesign note).

use crate::model::{ClientAnalysisReport, SearchIntent, SourceResultEnvelope};
use serde::{Deserialize, Serialize};

/// Default channel capacity; sized to hold one full session's worth of
/// `source_result` events (bounded by `MAX_CONCURRENT_SEARCHES`) without
/// backpressure on the happy path.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Start {
        session_id: String,
        client_name: String,
        inn: Option<String>,
    },
    Progress {
        session_id: String,
        percent: u8,
        stage: crate::model::Stage,
    },
    Orchestrator {
        session_id: String,
        plan: Vec<SearchIntent>,
    },
    SourceResult {
        session_id: String,
        result: SourceResultEnvelope,
    },
    Report {
        session_id: String,
        report: ClientAnalysisReport,
    },
    AwaitingFeedback {
        session_id: String,
        report_id: String,
    },
    Result {
        session_id: String,
        report: ClientAnalysisReport,
        saved_files: Vec<String>,
    },
    Complete {
        session_id: String,
    },
    Failed {
        session_id: String,
        error: crate::error::ErrorPayload,
    },
}

impl WorkflowEvent {
    pub fn session_id(&self) -> &str {
        match self {
            WorkflowEvent::Start { session_id, .. }
            | WorkflowEvent::Progress { session_id, .. }
            | WorkflowEvent::Orchestrator { session_id, .. }
            | WorkflowEvent::SourceResult { session_id, .. }
            | WorkflowEvent::Report { session_id, .. }
            | WorkflowEvent::AwaitingFeedback { session_id, .. }
            | WorkflowEvent::Result { session_id, .. }
            | WorkflowEvent::Complete { session_id }
            | WorkflowEvent::Failed { session_id, .. } => session_id,
        }
    }
}

/// Publishes events to subscribers; implemented over `tokio::sync::broadcast`
/// by [`crate::workflow::EventBus`].
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: WorkflowEvent);
}
