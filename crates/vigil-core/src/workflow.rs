//! Workflow state machine (spec §4.6): drives stages *plan -> collect ->
//! analyze -> (feedback loop) -> persist*, enforcing the entry invariants
//! and emitting typed events to any subscriber.
//!
//! Concurrency model (spec §5): each session's [`WorkflowState`] has a
//! single writer — this module. Agents return deltas; nothing outside this
//! file mutates a `WorkflowState` in place.

use crate::agents::{analyzer, collector, planner, writer};
use crate::error::{ErrorPayload, Result, VigilError};
use crate::events::{EventPublisher, WorkflowEvent};
use crate::model::{
    AnalysisInputs, FeedbackRating, SearchCategory, SearchIntent, SourceStatus, Stage,
    ThreadRecord, UserFeedback, WorkflowState, MAX_FEEDBACK_RETRIES,
};
use crate::traits::{AnalyticsClient, CourtClient, LlmProvider, RegistryClient, Repository, SearchClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Broadcast-backed [`EventPublisher`]; bounded so a slow SSE subscriber
/// never stalls the state machine (spec §9).
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: WorkflowEvent) {
        // A send error just means there are currently no subscribers (e.g.
        // the SSE client disconnected); the run continues regardless
        // (spec §4.9).
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::events::EVENT_CHANNEL_CAPACITY)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_concurrent_searches: usize,
    pub max_feedback_retries: u32,
    pub workflow_timeout: Duration,
    pub llm_call_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 5,
            max_feedback_retries: MAX_FEEDBACK_RETRIES,
            workflow_timeout: Duration::from_secs(300),
            llm_call_timeout: Duration::from_secs(60),
        }
    }
}

/// Typed handles to every external collaborator, constructed once at
/// startup (spec §9's "explicit service context" redesign note, replacing
/// the source's singletons-with-lazy-init).
pub struct WorkflowDeps {
    pub registry: Arc<dyn RegistryClient>,
    pub court: Arc<dyn CourtClient>,
    pub analytics: Arc<dyn AnalyticsClient>,
    pub search_clients: Vec<Arc<dyn SearchClient>>,
    pub llm_providers: Vec<Box<dyn LlmProvider>>,
    pub repository: Arc<dyn Repository>,
    pub pdf_renderer: Arc<dyn writer::PdfRenderer>,
}

fn progress(events: &dyn EventPublisher, session_id: &str, percent: u8, stage: Stage) {
    events.publish(WorkflowEvent::Progress {
        session_id: session_id.to_string(),
        percent,
        stage,
    });
}

/// Checked at each stage boundary in [`run_session_inner`] (spec §5: "the
/// state machine checks a cancellation flag at each suspension point").
/// `DELETE /agent/analyze/{session_id}` flips the flag from outside; the run
/// itself only ever reads it.
fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::SeqCst) {
        Err(VigilError::Cancelled)
    } else {
        Ok(())
    }
}

fn fail(state: &mut WorkflowState, events: &dyn EventPublisher, err: VigilError) {
    state.stage = Stage::Failed;
    let payload = ErrorPayload::from_error(&err, None);
    state.error = Some(payload.clone());
    events.publish(WorkflowEvent::Failed {
        session_id: state.session_id.clone(),
        error: payload,
    });
}

/// Runs a brand-new session end to end: `planning -> collecting ->
/// analyzing -> persisting -> completed`.
///
/// The direct REST/queue entry point never solicits feedback, so
/// `awaiting_feedback` is never entered on this path — a client streaming
/// over SSE never observes that event, satisfying the "no feedback was
/// solicited" branch of that stage's entry invariant (spec §4.6). Use
/// [`rerun_with_feedback`] for the human-in-the-loop rerun path once a
/// caller has actually posted feedback against a completed report.
#[instrument(skip(deps, events, cancel), fields(session_id = %session_id))]
pub async fn run_session(
    session_id: String,
    inputs: AnalysisInputs,
    deps: &WorkflowDeps,
    config: &WorkflowConfig,
    events: &dyn EventPublisher,
    cancel: &AtomicBool,
) -> WorkflowState {
    if let Some(existing) = existing_completed_thread(deps.repository.as_ref(), &session_id).await {
        info!(session_id = %session_id, "thread already completed; skipping re-run on redelivery");
        return existing;
    }

    let mut state = WorkflowState::new(session_id.clone(), inputs);
    let outcome = tokio::time::timeout(
        config.workflow_timeout,
        run_session_inner(&mut state, deps, config, events, cancel),
    )
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(VigilError::Cancelled)) => {
            state.cancelled = true;
            fail(&mut state, events, VigilError::Cancelled);
        }
        Ok(Err(e)) => fail(&mut state, events, e),
        Err(_elapsed) => fail(&mut state, events, VigilError::WorkflowTimeout),
    }

    if state.stage == Stage::Failed {
        if let Err(e) = writer::write_thread_only(
            deps.repository.as_ref(),
            &state.session_id,
            &state.inputs.client_name,
            state.inputs.inn.as_deref(),
            &state,
        )
        .await
        {
            warn!(error = %e, "failed to persist thread snapshot for failed session");
        }
    }
    state
}

/// Redelivery guard (spec §4.8, testable property 5): the workflow is
/// idempotent on its session/task id against the threads space, so a
/// duplicate queue delivery past the process-local `IdempotencyGuard`
/// window — or to a second consumer process entirely — still produces at
/// most one `StoredReport`, rather than relying solely on that 60s guard.
async fn existing_completed_thread(repository: &dyn Repository, session_id: &str) -> Option<WorkflowState> {
    match repository.get_thread(session_id).await {
        Ok(Some(thread)) if thread.thread_data.stage == Stage::Completed && thread.thread_data.report.is_some() => {
            Some(thread.thread_data)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "failed to check threads space for an existing session; proceeding with a fresh run");
            None
        }
    }
}

async fn run_session_inner(
    state: &mut WorkflowState,
    deps: &WorkflowDeps,
    config: &WorkflowConfig,
    events: &dyn EventPublisher,
    cancel: &AtomicBool,
) -> Result<()> {
    events.publish(WorkflowEvent::Start {
        session_id: state.session_id.clone(),
        client_name: state.inputs.client_name.clone(),
        inn: state.inputs.inn.clone(),
    });

    // --- planning ---
    if state.inputs.client_name.trim().is_empty() {
        return Err(VigilError::InvalidInput("client_name must not be empty".into()));
    }
    check_cancelled(cancel)?;
    progress(events, &state.session_id, 5, Stage::Planning);
    let outcome = planner::plan(&state.inputs);
    if let Some(warning) = &outcome.warning {
        warn!(session_id = %state.session_id, warning, "planner warning");
    }
    state.plan = outcome.plan;
    state.stage = Stage::Collecting;
    events.publish(WorkflowEvent::Orchestrator {
        session_id: state.session_id.clone(),
        plan: state.plan.clone(),
    });

    // --- collecting ---
    if state.plan.is_empty() {
        return Err(VigilError::InsufficientData("empty plan".into()));
    }
    check_cancelled(cancel)?;
    progress(events, &state.session_id, 20, Stage::Collecting);
    let collected = collector::collect(
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        &state.plan,
        deps.registry.as_ref(),
        deps.court.as_ref(),
        deps.analytics.as_ref(),
        &deps.search_clients,
        config.max_concurrent_searches,
    )
    .await?;

    for envelope in collected.source_data.values() {
        events.publish(WorkflowEvent::SourceResult {
            session_id: state.session_id.clone(),
            result: envelope.clone(),
        });
    }
    let any_success = collected
        .source_data
        .values()
        .any(|e| e.status != crate::model::SourceStatus::Failed);
    state.source_data = collected.source_data;
    state.search_results = collected.search_results;
    state.collection_stats = collected.stats;
    state.registry_facts = Some(collected.registry_facts);
    state.court_facts = Some(collected.court_facts);
    state.analytics_facts = Some(collected.analytics_facts);

    // --- analyzing: entry invariant requires at least one successful source ---
    if !any_success {
        return Err(VigilError::InsufficientData(
            "no source returned success".to_string(),
        ));
    }
    state.stage = Stage::Analyzing;
    check_cancelled(cancel)?;
    progress(events, &state.session_id, 60, Stage::Analyzing);

    let analyzed = analyzer::analyze(
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        &state.source_data,
        &state.search_results,
        state.registry_facts.as_ref().unwrap_or(&Default::default()),
        state.court_facts.as_ref().unwrap_or(&Default::default()),
        state.analytics_facts.as_ref().unwrap_or(&Default::default()),
        &deps.llm_providers,
        config.llm_call_timeout,
        None,
    )
    .await;
    state.report = Some(analyzed.report.clone());
    state.pending_report_id = Some(analyzed.report_id.clone());
    events.publish(WorkflowEvent::Report {
        session_id: state.session_id.clone(),
        report: analyzed.report.clone(),
    });

    // --- persisting: the direct entry path never solicits feedback, so
    // awaiting_feedback is skipped entirely rather than entered and left
    // transiently (spec §4.6's "no feedback was solicited" branch) ---
    state.stage = Stage::Persisting;
    check_cancelled(cancel)?;
    progress(events, &state.session_id, 90, Stage::Persisting);

    // Thread snapshot is saved inside `writer::write`, so the stage is
    // already `completed` by the time it's persisted — otherwise
    // `GET /agent/thread_history` would show a finished session as stuck
    // mid-persist.
    state.stage = Stage::Completed;
    let write_outcome = writer::write(
        deps.repository.as_ref(),
        deps.pdf_renderer.as_ref(),
        &analyzed.report_id,
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        analyzed.report.clone(),
        &state.session_id,
        state,
    )
    .await?;

    events.publish(WorkflowEvent::Result {
        session_id: state.session_id.clone(),
        report: analyzed.report,
        saved_files: write_outcome.saved_files,
    });
    events.publish(WorkflowEvent::Complete {
        session_id: state.session_id.clone(),
    });
    info!(session_id = %state.session_id, "session completed");
    Ok(())
}

/// Runs a collecting pass scoped to `focus_areas` and merges it into
/// `state`'s evidence. Registry/court/analytics are refreshed too (the
/// collector always queries them); their facts only replace the existing
/// ones when the refreshed lookup actually succeeded, so a transient
/// failure here never regresses evidence the original pass already had.
async fn recollect_focus_areas(
    state: &mut WorkflowState,
    deps: &WorkflowDeps,
    config: &WorkflowConfig,
    focus_areas: &[String],
) {
    let intents: Vec<SearchIntent> = focus_areas
        .iter()
        .map(|area| SearchIntent {
            category: SearchCategory::Custom,
            query: format!("{} {area}", state.inputs.client_name),
        })
        .collect();

    let outcome = collector::collect(
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        &intents,
        deps.registry.as_ref(),
        deps.court.as_ref(),
        deps.analytics.as_ref(),
        &deps.search_clients,
        config.max_concurrent_searches,
    )
    .await;

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            warn!(error = %e, "focus-area recollection failed; re-analyzing on existing evidence only");
            return;
        }
    };

    let registry_ok = outcome
        .source_data
        .get("registry")
        .map(|e| e.status != SourceStatus::Failed)
        .unwrap_or(false);
    let court_ok = outcome
        .source_data
        .get("court")
        .map(|e| e.status != SourceStatus::Failed)
        .unwrap_or(false);
    let analytics_ok = outcome
        .source_data
        .get("analytics")
        .map(|e| e.status != SourceStatus::Failed)
        .unwrap_or(false);

    if registry_ok {
        state.registry_facts = Some(outcome.registry_facts);
    }
    if court_ok {
        state.court_facts = Some(outcome.court_facts);
    }
    if analytics_ok {
        state.analytics_facts = Some(outcome.analytics_facts);
    }

    state.source_data.extend(outcome.source_data);
    state.search_results.extend(outcome.search_results);
    state.collection_stats.sources_attempted += outcome.stats.sources_attempted;
    state.collection_stats.sources_succeeded += outcome.stats.sources_succeeded;
    state.collection_stats.sources_failed += outcome.stats.sources_failed;
    state.collection_stats.total_duration_ms += outcome.stats.total_duration_ms;
}

/// Re-enters `analyzing` for a prior thread after `inaccurate` or
/// `partially_accurate` feedback (spec §4.6, E2E-4).
///
/// The analyzer re-synthesizes from the existing `source_data` and
/// `search_results` only, unless `feedback.focus_areas` names specific
/// topics — in which case a restricted collecting pass runs first, scoped
/// to one [`SearchCategory::Custom`] intent per focus area, and its results
/// are merged into the thread's evidence before re-analysis.
#[instrument(skip(deps, events, thread), fields(thread_id = %thread.thread_id))]
pub async fn rerun_with_feedback(
    mut thread: ThreadRecord,
    feedback: UserFeedback,
    deps: &WorkflowDeps,
    config: &WorkflowConfig,
    events: &dyn EventPublisher,
) -> Result<WorkflowState> {
    let state = &mut thread.thread_data;

    if matches!(feedback.rating, FeedbackRating::Accurate) {
        state.user_feedback = Some(feedback);
        state.stage = Stage::Completed;
        return Ok(state.clone());
    }

    if state.retry_count >= config.max_feedback_retries {
        fail(state, events, VigilError::WorkflowTimeout);
        return Ok(state.clone());
    }

    state.previous_report = state.report.clone();
    state.user_comment = feedback.comment.clone();
    state.user_feedback = Some(feedback.clone());
    state.retry_count += 1;

    if !feedback.focus_areas.is_empty() {
        state.stage = Stage::Collecting;
        progress(events, &state.session_id, 40, Stage::Collecting);
        recollect_focus_areas(state, deps, config, &feedback.focus_areas).await;
    }

    state.stage = Stage::Analyzing;
    progress(events, &state.session_id, 60, Stage::Analyzing);

    let analyzed = analyzer::analyze(
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        &state.source_data,
        &state.search_results,
        state.registry_facts.as_ref().unwrap_or(&Default::default()),
        state.court_facts.as_ref().unwrap_or(&Default::default()),
        state.analytics_facts.as_ref().unwrap_or(&Default::default()),
        &deps.llm_providers,
        config.llm_call_timeout,
        state.user_comment.as_deref(),
    )
    .await;

    state.report = Some(analyzed.report.clone());
    state.pending_report_id = Some(analyzed.report_id.clone());
    events.publish(WorkflowEvent::Report {
        session_id: state.session_id.clone(),
        report: analyzed.report.clone(),
    });

    state.stage = Stage::Completed;
    let write_outcome = writer::write(
        deps.repository.as_ref(),
        deps.pdf_renderer.as_ref(),
        &analyzed.report_id,
        &state.inputs.client_name,
        state.inputs.inn.as_deref(),
        analyzed.report.clone(),
        &state.session_id,
        state,
    )
    .await?;

    events.publish(WorkflowEvent::Result {
        session_id: state.session_id.clone(),
        report: analyzed.report,
        saved_files: write_outcome.saved_files,
    });
    events.publish(WorkflowEvent::Complete {
        session_id: state.session_id.clone(),
    });

    Ok(state.clone())
}
