//! Wire shapes for the three queue protocols in spec §6.3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::model::{AnalysisTask, ClientAnalysisReport};

/// Published to `analysis_results` once a task finishes, successfully or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResultMessage {
    pub task_id: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ClientAnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<vigil_core::ErrorPayload>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Published to `cache_queue`: an instruction to drop cached entries sharing
/// a key prefix (e.g. after a registry record is known to be stale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInvalidationJob {
    pub key_prefix: String,
    pub reason: String,
    pub enqueued_at: DateTime<Utc>,
}

/// What a handler passed to [`crate::consumer::AnalysisConsumer::run`] hands
/// back once the workflow state machine reaches a terminal stage. Distinct
/// from the `Err` path of that handler's `Result`, which is reserved for
/// transient failures (e.g. the handler couldn't even invoke the workflow)
/// that should go through the requeue/DLQ path (spec §7: "lets the broker
/// redeliver for transient storage/queue errors ... acks for terminal
/// workflow outcomes").
#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    Completed(ClientAnalysisReport),
    Failed(vigil_core::ErrorPayload),
}

/// Envelope shape shared by `dlq.analysis`/`dlq.cache` (spec §6.3:
/// `{original, last_error, attempts}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope<T> {
    pub original: T,
    pub last_error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl<T> DlqEnvelope<T> {
    pub fn new(original: T, last_error: impl Into<String>, attempts: u32) -> Self {
        Self { original, last_error: last_error.into(), attempts, failed_at: Utc::now() }
    }
}

pub type AnalysisDlqEnvelope = DlqEnvelope<AnalysisTask>;
pub type CacheDlqEnvelope = DlqEnvelope<CacheInvalidationJob>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_result_omits_error_field_when_serialized() {
        let msg = AnalysisResultMessage {
            task_id: "task-1".to_string(),
            status: ResultStatus::Completed,
            report: None,
            error: None,
            completed_at: Utc::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("error").is_none());
        assert!(value.get("report").is_none());
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn dlq_envelope_round_trips_through_json() {
        let job = CacheInvalidationJob {
            key_prefix: "registry:acme".to_string(),
            reason: "record updated".to_string(),
            enqueued_at: Utc::now(),
        };
        let envelope = CacheDlqEnvelope::new(job, "broker unreachable", 4);
        let serialized = serde_json::to_string(&envelope).unwrap();
        let deserialized: CacheDlqEnvelope = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.attempts, 4);
        assert_eq!(deserialized.last_error, "broker unreachable");
        assert_eq!(deserialized.original.key_prefix, "registry:acme");
    }
}
