//! Deterministic lexicon-based sentiment tagging for web-search snippets
//! (spec §4.7). Explicit keyword matching, not an LLM call.

use crate::model::Sentiment;

const NEGATIVE_KEYWORDS: &[&str] = &[
    "fraud", "scandal", "lawsuit", "bankrupt", "bankruptcy", "scam", "complaint",
    "investigation", "fined", "penalty", "sanction", "default", "debt", "liquidation",
    "sued", "fail", "failure", "violat", "corrupt", "criminal",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "award", "growth", "profit", "success", "expansion", "innovative", "leading",
    "excellent", "trusted", "reliable", "recommend", "best", "top-rated", "strong",
];

/// Scores `text` by counting lexicon hits and returns the majority label;
/// ties (including zero hits on both sides) are `Neutral`.
pub fn annotate(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let neg = NEGATIVE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    let pos = POSITIVE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    match neg.cmp(&pos) {
        std::cmp::Ordering::Greater => Sentiment::Negative,
        std::cmp::Ordering::Less => Sentiment::Positive,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_negative() {
        assert_eq!(annotate("Company faces fraud investigation"), Sentiment::Negative);
    }

    #[test]
    fn detects_positive() {
        assert_eq!(annotate("Company wins innovation award for strong growth"), Sentiment::Positive);
    }

    #[test]
    fn neutral_on_no_hits() {
        assert_eq!(annotate("Company opened a new office downtown"), Sentiment::Neutral);
    }

    #[test]
    fn is_deterministic() {
        let text = "fraud investigation but also strong growth award";
        assert_eq!(annotate(text), annotate(text));
    }
}
