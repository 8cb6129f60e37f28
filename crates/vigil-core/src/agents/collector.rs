//! Collector agent (spec §4.7): fans out to provider clients concurrently,
//! bounded by a semaphore, and aggregates partial failures. Critical sources
//! (registry + analytics) failing both yields `InsufficientData`.

use crate::error::{Result, VigilError};
use crate::model::{CircuitState, CollectionStats, SearchIntent, SearchResultSnippet, SourceResultEnvelope, SourceStatus};
use crate::scorer::{AnalyticsFacts, CourtFacts, RegistryFacts};
use crate::sentiment;
use crate::traits::{AnalyticsClient, CourtClient, RegistryClient, SearchClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Deltas the collector hands back to the state-machine driver; the
/// collector never mutates `WorkflowState` directly (spec §9).
pub struct CollectOutcome {
    pub source_data: BTreeMap<String, SourceResultEnvelope>,
    pub search_results: Vec<SearchResultSnippet>,
    pub stats: CollectionStats,
    pub registry_facts: RegistryFacts,
    pub court_facts: CourtFacts,
    pub analytics_facts: AnalyticsFacts,
}

fn failed_envelope(source: &str, err: &VigilError, duration_ms: u64) -> SourceResultEnvelope {
    SourceResultEnvelope {
        source: source.to_string(),
        status: SourceStatus::Failed,
        payload: None,
        error: Some(err.to_string()),
        duration_ms,
        retries: 0,
        circuit_state: if matches!(err, VigilError::CircuitOpen(_)) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        },
    }
}

/// Runs the collection stage. `max_concurrent` bounds in-flight search
/// calls (default 5, spec §5); registry/court/analytics are always called
/// (they are not part of `plan`, which only drives the search providers).
#[allow(clippy::too_many_arguments)]
pub async fn collect(
    client_name: &str,
    inn: Option<&str>,
    plan: &[SearchIntent],
    registry: &dyn RegistryClient,
    court: &dyn CourtClient,
    analytics: &dyn AnalyticsClient,
    search_clients: &[Arc<dyn SearchClient>],
    max_concurrent: usize,
) -> Result<CollectOutcome> {
    let mut source_data = BTreeMap::new();
    let mut stats = CollectionStats::default();

    let registry_start = std::time::Instant::now();
    let (registry_envelope, registry_facts) = match registry.lookup(client_name, inn).await {
        Ok((env, rec)) => (
            env,
            RegistryFacts {
                status: rec.status,
                sanctions_flag: rec.sanctions_flag,
                terrorist_list_flag: rec.terrorist_list_flag,
                tax_debt_flag: rec.tax_debt_flag,
            },
        ),
        Err(e) => (
            failed_envelope("registry", &e, registry_start.elapsed().as_millis() as u64),
            RegistryFacts::default(),
        ),
    };
    let registry_ok = registry_envelope.status != SourceStatus::Failed;
    source_data.insert("registry".to_string(), registry_envelope);

    let court_start = std::time::Instant::now();
    let (court_envelope, court_facts) = match court.search_cases(client_name, inn).await {
        Ok((env, rec)) => (
            env,
            CourtFacts {
                case_count: rec.case_count,
                recent_case_count: rec.recent_case_count,
            },
        ),
        Err(e) => (
            failed_envelope("court", &e, court_start.elapsed().as_millis() as u64),
            CourtFacts::default(),
        ),
    };
    source_data.insert("court".to_string(), court_envelope);

    let analytics_start = std::time::Instant::now();
    let (analytics_envelope, analytics_facts) = match analytics.analyze(client_name, inn).await {
        Ok((env, rec)) => (
            env,
            AnalyticsFacts {
                bankruptcy_flag: rec.bankruptcy_flag,
                negative_flags: rec.negative_flags,
            },
        ),
        Err(e) => (
            failed_envelope("analytics", &e, analytics_start.elapsed().as_millis() as u64),
            AnalyticsFacts::default(),
        ),
    };
    let analytics_ok = analytics_envelope.status != SourceStatus::Failed;
    source_data.insert("analytics".to_string(), analytics_envelope);

    stats.sources_attempted += 3;
    stats.sources_succeeded += [registry_ok, analytics_ok].iter().filter(|x| **x).count() as u32;

    if !registry_ok && !analytics_ok {
        warn!(client_name, "both critical sources failed");
        return Err(VigilError::InsufficientData(
            "registry and analytics both failed".to_string(),
        ));
    }

    // Search providers: non-critical, bounded concurrency fan-out.
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut join_set = tokio::task::JoinSet::new();
    for intent in plan {
        for client in search_clients {
            let sem = semaphore.clone();
            let client = client.clone();
            let intent = intent.clone();
            let client_name = client_name.to_string();
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let start = std::time::Instant::now();
                let outcome = client.search(&intent, &client_name).await;
                (client.name().to_string(), outcome, start.elapsed().as_millis() as u64)
            });
        }
    }

    let mut search_results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        let (source, outcome, duration_ms) = match joined {
            Ok(v) => v,
            Err(join_err) => {
                warn!(%join_err, "search task panicked");
                continue;
            }
        };
        stats.sources_attempted += 1;
        stats.total_duration_ms += duration_ms;
        match outcome {
            Ok((envelope, mut snippets)) => {
                stats.sources_succeeded += 1;
                source_data.insert(source.clone(), envelope);
                for s in snippets.iter_mut() {
                    s.sentiment = sentiment::annotate(&s.snippet);
                }
                search_results.append(&mut snippets);
            }
            Err(e) => {
                stats.sources_failed += 1;
                info!(source, error = %e, "non-critical search source failed, tolerated");
                source_data.insert(source.clone(), failed_envelope(&source, &e, duration_ms));
            }
        }
    }

    Ok(CollectOutcome {
        source_data,
        search_results,
        stats,
        registry_facts,
        court_facts,
        analytics_facts,
    })
}
