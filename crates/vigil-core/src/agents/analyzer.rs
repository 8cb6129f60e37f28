//! Analyzer agent (spec §4.7): invokes the LLM cascade with a JSON schema
//! matching [`ClientAnalysisReport`], then always overwrites
//! `risk_assessment` with the deterministic scorer's output.

use crate::model::{
    ClientAnalysisReport, Finding, ReportMetadata, SearchCategory, SearchResultSnippet,
    Sentiment, SourceResultEnvelope,
};
use crate::scorer::{self, AnalyticsFacts, CourtFacts, RegistryFacts};
use crate::traits::LlmProvider;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// JSON schema the LLM cascade is asked to satisfy. Mirrors
/// [`ClientAnalysisReport`]'s narrative fields only — `risk_assessment` is
/// always recomputed by the scorer, so the schema omits it.
pub fn report_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["summary", "findings", "recommendations", "citations"],
        "properties": {
            "summary": {"type": "string"},
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["category", "source", "sentiment", "key_points"],
                    "properties": {
                        "category": {"type": "string"},
                        "source": {"type": "string"},
                        "sentiment": {"type": "string", "enum": ["positive", "neutral", "negative"]},
                        "key_points": {"type": "array", "items": {"type": "string"}}
                    }
                }
            },
            "recommendations": {"type": "array", "items": {"type": "string"}},
            "citations": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn build_prompt(
    client_name: &str,
    inn: Option<&str>,
    source_data: &BTreeMap<String, SourceResultEnvelope>,
    search_results: &[SearchResultSnippet],
    user_comment: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are assessing counterparty risk for \"{client_name}\" (INN: {}).\n\n",
        inn.unwrap_or("unknown")
    );
    prompt.push_str("Collected evidence:\n");
    for (source, envelope) in source_data {
        prompt.push_str(&format!(
            "- {source}: status={:?} payload={}\n",
            envelope.status,
            envelope
                .payload
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "null".into())
        ));
    }
    prompt.push_str("\nWeb search snippets:\n");
    for s in search_results {
        prompt.push_str(&format!(
            "- [{:?}/{:?}] {}: {}\n",
            s.category, s.sentiment, s.title, s.snippet
        ));
    }
    if let Some(comment) = user_comment {
        prompt.push_str(&format!(
            "\nA prior report on this counterparty was reviewed and rejected with this \
             feedback, which you must address without requesting new data collection: {comment}\n"
        ));
    }
    prompt.push_str(
        "\nReturn a JSON object with: summary (markdown), findings (category, source, \
         sentiment, key_points), recommendations, citations. Do not include a risk score; \
         it is computed separately.",
    );
    prompt
}

pub struct AnalyzeOutcome {
    pub report: ClientAnalysisReport,
    pub report_id: String,
}

fn degraded_report(
    client_name: &str,
    inn: Option<&str>,
    source_data: &BTreeMap<String, SourceResultEnvelope>,
    search_results: &[SearchResultSnippet],
    risk_assessment: crate::model::RiskAssessment,
) -> ClientAnalysisReport {
    let findings = search_results
        .iter()
        .map(|s| Finding {
            category: s.category,
            source: s.source.clone(),
            sentiment: s.sentiment,
            key_points: vec![s.title.clone()],
        })
        .collect();
    let legal_cases_count = source_data
        .get("court")
        .and_then(|e| e.payload.as_ref())
        .and_then(|p| p.get("case_count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    ClientAnalysisReport {
        metadata: ReportMetadata {
            client_name: client_name.to_string(),
            inn: inn.map(str::to_string),
            analysis_date: chrono::Utc::now(),
            sources_used: source_data.keys().cloned().collect(),
        },
        company_info: serde_json::json!({}),
        legal_cases_count,
        risk_assessment,
        findings,
        summary: format!(
            "Automated degraded report for {client_name}: the LLM narrative layer was \
             unavailable, so this summary reflects only the deterministic risk score and \
             raw evidence counts."
        ),
        citations: Vec::new(),
        recommendations: vec!["Review raw source data manually; LLM synthesis failed.".into()],
        degraded: true,
    }
}

fn parse_llm_report(
    value: &serde_json::Value,
    client_name: &str,
    inn: Option<&str>,
    source_data: &BTreeMap<String, SourceResultEnvelope>,
    risk_assessment: crate::model::RiskAssessment,
) -> Option<ClientAnalysisReport> {
    let summary = value.get("summary")?.as_str()?.to_string();
    let findings = value
        .get("findings")?
        .as_array()?
        .iter()
        .filter_map(|f| {
            let category = match f.get("category")?.as_str()? {
                "reputation" => SearchCategory::Reputation,
                "lawsuits" => SearchCategory::Lawsuits,
                "news" => SearchCategory::News,
                "negative" => SearchCategory::Negative,
                "financial" => SearchCategory::Financial,
                _ => SearchCategory::Custom,
            };
            let sentiment = match f.get("sentiment")?.as_str()? {
                "positive" => Sentiment::Positive,
                "negative" => Sentiment::Negative,
                _ => Sentiment::Neutral,
            };
            Some(Finding {
                category,
                source: f.get("source")?.as_str()?.to_string(),
                sentiment,
                key_points: f
                    .get("key_points")?
                    .as_array()?
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect(),
            })
        })
        .collect();
    let recommendations = value
        .get("recommendations")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let citations = value
        .get("citations")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let legal_cases_count = source_data
        .get("court")
        .and_then(|e| e.payload.as_ref())
        .and_then(|p| p.get("case_count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    Some(ClientAnalysisReport {
        metadata: ReportMetadata {
            client_name: client_name.to_string(),
            inn: inn.map(str::to_string),
            analysis_date: chrono::Utc::now(),
            sources_used: source_data.keys().cloned().collect(),
        },
        company_info: serde_json::json!({}),
        legal_cases_count,
        risk_assessment,
        findings,
        summary,
        citations,
        recommendations,
        degraded: false,
    })
}

/// Runs the analysis stage. `providers` is the fixed cascade order
/// (OpenRouter, HuggingFace, GigaChat, YandexGPT); unconfigured providers
/// are skipped (spec §4.4).
#[allow(clippy::too_many_arguments)]
pub async fn analyze(
    client_name: &str,
    inn: Option<&str>,
    source_data: &BTreeMap<String, SourceResultEnvelope>,
    search_results: &[SearchResultSnippet],
    registry_facts: &RegistryFacts,
    court_facts: &CourtFacts,
    analytics_facts: &AnalyticsFacts,
    providers: &[Box<dyn LlmProvider>],
    per_call_timeout: Duration,
    user_comment: Option<&str>,
) -> AnalyzeOutcome {
    let risk_assessment = scorer::score(
        registry_facts,
        court_facts,
        analytics_facts,
        search_results,
        source_data,
    );

    let prompt = build_prompt(client_name, inn, source_data, search_results, user_comment);
    let schema = report_schema();

    let mut fallback_depth = 0usize;
    let mut report = None;
    for provider in providers {
        if !provider.is_configured() {
            continue;
        }
        let start = std::time::Instant::now();
        match provider.generate_json(&prompt, &schema, per_call_timeout).await {
            Ok(value) => {
                if let Some(parsed) =
                    parse_llm_report(&value, client_name, inn, source_data, risk_assessment.clone())
                {
                    info!(
                        provider = provider.name(),
                        fallback_depth,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "LLM cascade succeeded"
                    );
                    report = Some(parsed);
                    break;
                }
                // Single repair attempt: strict re-prompt for valid JSON.
                let repair_prompt = format!(
                    "{prompt}\n\nYour previous response did not match the required JSON \
                     schema. Return ONLY valid JSON matching this schema: {schema}"
                );
                match provider
                    .generate_json(&repair_prompt, &schema, per_call_timeout)
                    .await
                {
                    Ok(repaired) => {
                        if let Some(parsed) = parse_llm_report(
                            &repaired,
                            client_name,
                            inn,
                            source_data,
                            risk_assessment.clone(),
                        ) {
                            report = Some(parsed);
                            break;
                        }
                    }
                    Err(e) => warn!(provider = provider.name(), error = %e, "repair attempt failed"),
                }
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "LLM provider failed, trying next");
            }
        }
        fallback_depth += 1;
    }

    let report = report.unwrap_or_else(|| {
        degraded_report(client_name, inn, source_data, search_results, risk_assessment)
    });
    let report_id = Uuid::new_v4().to_string();
    AnalyzeOutcome { report, report_id }
}
