//! Shared JSON-mode helpers. The cascade's single-repair-attempt logic
//! (spec §4.4) lives in `vigil_core::agents::analyzer`, which re-invokes
//! `generate_json` with a stricter prompt when the first JSON value doesn't
//! parse into a [`vigil_core::model::ClientAnalysisReport`]; a provider's
//! own `generate_json` only needs to turn one prompt into one JSON value.

use serde_json::Value;
use vigil_core::{Result, VigilError};

/// Extracts the first JSON value found in `text`, tolerating a
/// ```` ```json ... ``` ```` fence around it (models reliably wrap JSON in
/// one even when told not to).
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(candidate).map_err(|e| VigilError::SchemaMismatch(format!("not valid JSON: {e}")))
}

/// Appends a schema-following instruction to a prompt, for providers with no
/// native structured-output mode.
pub fn with_schema_instruction(prompt: &str, schema: &Value) -> String {
    format!("{prompt}\n\nRespond with ONLY a JSON value matching this schema, no commentary, no markdown fence:\n{schema}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_strips_code_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn extract_json_rejects_prose() {
        assert!(extract_json("sure, here you go: not json").is_err());
    }

    #[test]
    fn extract_json_handles_bare_json_without_fence() {
        assert_eq!(extract_json("  {\"ok\": true}  ").unwrap(), json!({"ok": true}));
    }
}
