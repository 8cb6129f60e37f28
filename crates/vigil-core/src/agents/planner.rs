//! Planner agent (spec §4.7): generates a plan of built-in intents plus one
//! custom intent per non-empty line of `notes`.
//!
//! Agents are plain functions `(state, deps) -> delta`, never holding a
//! reference back into the workflow state machine (spec §9).

use crate::inn::is_valid_inn;
use crate::model::{AnalysisInputs, SearchCategory, SearchIntent};

pub struct PlanOutcome {
    pub plan: Vec<SearchIntent>,
    pub warning: Option<String>,
}

/// Builds the plan for a session. INN-gated templates (`lawsuits`,
/// `financial`) are only added when an INN was supplied (invariant 4); an
/// invalid-but-present INN still yields those intents, with a warning
/// attached, since the scorer downweights those categories itself rather
/// than the planner refusing to search for them (spec §4.7).
pub fn plan(inputs: &AnalysisInputs) -> PlanOutcome {
    let mut plan = Vec::new();
    let name = inputs.client_name.as_str();

    plan.push(SearchIntent {
        category: SearchCategory::Reputation,
        query: format!("{name} company reputation reviews"),
    });
    plan.push(SearchIntent {
        category: SearchCategory::News,
        query: format!("{name} news"),
    });
    plan.push(SearchIntent {
        category: SearchCategory::Negative,
        query: format!("{name} fraud scandal complaint"),
    });

    let mut warning = None;
    if let Some(inn) = inputs.inn.as_deref() {
        if !is_valid_inn(inn) {
            warning = Some(format!(
                "INN '{inn}' failed check-digit validation; proceeding with degraded confidence in financial/legal categories"
            ));
        }
        plan.push(SearchIntent {
            category: SearchCategory::Lawsuits,
            query: format!("{name} INN {inn} lawsuits court cases"),
        });
        plan.push(SearchIntent {
            category: SearchCategory::Financial,
            query: format!("{name} INN {inn} financial standing"),
        });
    }

    if let Some(notes) = inputs.notes.as_deref() {
        for line in notes.lines() {
            let line = line.trim();
            if !line.is_empty() {
                plan.push(SearchIntent {
                    category: SearchCategory::Custom,
                    query: line.to_string(),
                });
            }
        }
    }

    PlanOutcome { plan, warning }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(inn: Option<&str>, notes: Option<&str>) -> AnalysisInputs {
        AnalysisInputs {
            client_name: "Acme LLC".into(),
            inn: inn.map(str::to_string),
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn plan_is_never_empty() {
        let outcome = plan(&inputs(None, None));
        assert!(!outcome.plan.is_empty());
    }

    #[test]
    fn inn_gated_templates_require_inn() {
        let without = plan(&inputs(None, None));
        assert!(!without
            .plan
            .iter()
            .any(|i| i.category == SearchCategory::Lawsuits));

        let with = plan(&inputs(Some("7736050003"), None));
        assert!(with
            .plan
            .iter()
            .any(|i| i.category == SearchCategory::Lawsuits));
        assert!(with
            .plan
            .iter()
            .any(|i| i.category == SearchCategory::Financial));
        assert!(with.warning.is_none());
    }

    #[test]
    fn invalid_inn_still_plans_but_warns() {
        let outcome = plan(&inputs(Some("7736050004"), None));
        assert!(outcome.warning.is_some());
        assert!(outcome
            .plan
            .iter()
            .any(|i| i.category == SearchCategory::Lawsuits));
    }

    #[test]
    fn one_custom_intent_per_nonempty_notes_line() {
        let outcome = plan(&inputs(None, Some("check subsidiary X\n\ncheck CEO Y\n")));
        let custom: Vec<_> = outcome
            .plan
            .iter()
            .filter(|i| i.category == SearchCategory::Custom)
            .collect();
        assert_eq!(custom.len(), 2);
    }
}
