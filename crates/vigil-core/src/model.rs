//! Domain entities (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Thirty days, in seconds — the fixed TTL for [`StoredReport`] (invariant 2).
pub const REPORT_TTL_SECONDS: i64 = 30 * 86_400;

/// Cap on the feedback rerun loop (invariant 3).
pub const MAX_FEEDBACK_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub task_id: String,
    pub client_name: String,
    pub inn: Option<String>,
    pub notes: Option<String>,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Delivery attempt counter maintained by the queue consumer.
    pub attempt: u32,
}

impl AnalysisTask {
    pub fn new(client_name: String, inn: Option<String>, notes: Option<String>, priority: u8) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            client_name,
            inn,
            notes,
            priority: priority.clamp(1, 10),
            created_at: Utc::now(),
            status: TaskStatus::Pending,
            attempt: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Reputation,
    Lawsuits,
    News,
    Negative,
    Financial,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIntent {
    pub category: SearchCategory,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResultEnvelope {
    pub source: String,
    pub status: SourceStatus,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub retries: u32,
    pub circuit_state: CircuitState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultSnippet {
    pub category: SearchCategory,
    pub source: String,
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub sources_attempted: u32,
    pub sources_succeeded: u32,
    pub sources_failed: u32,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Derives the level strictly from the score per invariant 1:
    /// `<25 -> low, <50 -> medium, <75 -> high, >=75 -> critical`.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => RiskLevel::Low,
            25..=49 => RiskLevel::Medium,
            50..=74 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: String,
    pub description: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub client_name: String,
    pub inn: Option<String>,
    pub analysis_date: DateTime<Utc>,
    pub sources_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: SearchCategory,
    pub source: String,
    pub sentiment: Sentiment,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAnalysisReport {
    pub metadata: ReportMetadata,
    pub company_info: serde_json::Value,
    pub legal_cases_count: u32,
    pub risk_assessment: RiskAssessment,
    pub findings: Vec<Finding>,
    pub summary: String,
    pub citations: Vec<String>,
    pub recommendations: Vec<String>,
    /// Set when the analyzer fell back to a scorer-only report because the
    /// LLM cascade was unusable (spec §4.7).
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    pub report_id: String,
    pub inn: Option<String>,
    pub client_name: String,
    pub report_data: ClientAnalysisReport,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub risk_score: u8,
}

impl StoredReport {
    pub fn new(client_name: String, inn: Option<String>, report_data: ClientAnalysisReport) -> Self {
        let created_at = Utc::now();
        let risk_level = report_data.risk_assessment.level;
        let risk_score = report_data.risk_assessment.score;
        Self {
            report_id: Uuid::new_v4().to_string(),
            inn,
            client_name,
            report_data,
            created_at,
            expires_at: created_at + chrono::Duration::seconds(REPORT_TTL_SECONDS),
            risk_level,
            risk_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Collecting,
    Analyzing,
    AwaitingFeedback,
    Persisting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Accurate,
    PartiallyAccurate,
    Inaccurate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFeedback {
    pub rating: FeedbackRating,
    pub comment: Option<String>,
    pub focus_areas: Vec<String>,
}

/// Inputs supplied when a session is started; immutable for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInputs {
    pub client_name: String,
    pub inn: Option<String>,
    pub notes: Option<String>,
}

/// The single mutable state owned by the workflow state machine for one
/// session (spec §3, §5). Only the state-machine task may mutate this;
/// agents receive a read-only view and return deltas (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub inputs: AnalysisInputs,
    pub stage: Stage,
    pub plan: Vec<SearchIntent>,
    pub source_data: std::collections::BTreeMap<String, SourceResultEnvelope>,
    pub search_results: Vec<SearchResultSnippet>,
    pub collection_stats: CollectionStats,
    pub report: Option<ClientAnalysisReport>,
    pub retry_count: u32,
    pub user_feedback: Option<UserFeedback>,
    pub user_comment: Option<String>,
    pub previous_report: Option<ClientAnalysisReport>,
    pub error: Option<crate::error::ErrorPayload>,
    pub cancelled: bool,
    /// Parsed registry/court/analytics facts backing the scorer (spec
    /// §4.5). Kept alongside the opaque `source_data` envelopes so the
    /// analyzer and scorer never re-parse provider payloads.
    pub registry_facts: Option<crate::scorer::RegistryFacts>,
    pub court_facts: Option<crate::scorer::CourtFacts>,
    pub analytics_facts: Option<crate::scorer::AnalyticsFacts>,
    /// Allocated once the analyzer produces a report, before it is
    /// persisted, so `awaiting_feedback`'s `{report_id}` payload can
    /// reference it ahead of the `persisting` stage.
    pub pending_report_id: Option<String>,
}

impl WorkflowState {
    pub fn new(session_id: String, inputs: AnalysisInputs) -> Self {
        Self {
            session_id,
            inputs,
            stage: Stage::Planning,
            plan: Vec::new(),
            source_data: std::collections::BTreeMap::new(),
            search_results: Vec::new(),
            collection_stats: CollectionStats::default(),
            report: None,
            retry_count: 0,
            user_feedback: None,
            user_comment: None,
            previous_report: None,
            error: None,
            cancelled: false,
            registry_facts: None,
            court_facts: None,
            analytics_facts: None,
            pending_report_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub thread_data: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client_name: String,
    pub inn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub ttl_epoch_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

impl CacheEntry {
    /// A cache entry is observable iff `now < ttl_epoch_seconds` (invariant 5).
    pub fn is_observable(&self, now_epoch_seconds: i64) -> bool {
        now_epoch_seconds < self.ttl_epoch_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_boundaries_match_thresholds_exactly() {
        assert_eq!(RiskLevel::from_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(74), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Critical);
    }

    #[test]
    fn stored_report_expires_exactly_30_days_later() {
        let report = sample_report();
        let stored = StoredReport::new("Acme LLC".into(), None, report);
        let delta = stored.expires_at - stored.created_at;
        assert_eq!(delta.num_seconds(), REPORT_TTL_SECONDS);
    }

    fn sample_report() -> ClientAnalysisReport {
        ClientAnalysisReport {
            metadata: ReportMetadata {
                client_name: "Acme LLC".into(),
                inn: None,
                analysis_date: Utc::now(),
                sources_used: vec![],
            },
            company_info: serde_json::json!({}),
            legal_cases_count: 0,
            risk_assessment: RiskAssessment {
                score: 10,
                level: RiskLevel::Low,
                factors: vec![],
            },
            findings: vec![],
            summary: String::new(),
            citations: vec![],
            recommendations: vec![],
            degraded: false,
        }
    }
}
