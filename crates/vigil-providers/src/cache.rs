//! Deterministic cache-key construction and per-source TTLs (spec §4.3,
//! §6.6). Every provider client consults the repository's `cache` space
//! before calling out, keyed `f"{source}:{canonicalized_args}"`.

/// Registry lookups (company status, sanctions/terrorist/tax-debt flags).
pub const REGISTRY_TTL_SECONDS: i64 = 7_200;
/// Court case search.
pub const COURT_TTL_SECONDS: i64 = 9_600;
/// Bankruptcy/negative-flag analytics.
pub const ANALYTICS_TTL_SECONDS: i64 = 3_600;
/// Web-search snippets.
pub const SEARCH_TTL_SECONDS: i64 = 300;

/// Canonicalizes `(client_name, inn)` into a stable cache-key suffix:
/// lower-cased name, trimmed, with the INN appended when present. Argument
/// order never affects the key.
pub fn canonicalize_args(client_name: &str, inn: Option<&str>) -> String {
    let name = client_name.trim().to_lowercase();
    match inn {
        Some(inn) => format!("{name}|inn={inn}"),
        None => name,
    }
}

pub fn cache_key(source: &str, client_name: &str, inn: Option<&str>) -> String {
    format!("{source}:{}", canonicalize_args(client_name, inn))
}

/// Canonicalizes a search intent's category + query for the search cache key.
pub fn search_cache_key(source: &str, client_name: &str, category: &str, query: &str) -> String {
    let name = client_name.trim().to_lowercase();
    let query = query.trim().to_lowercase();
    format!("{source}:{name}|{category}|{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_regardless_of_case_and_whitespace() {
        let a = cache_key("registry", "  Acme LLC ", Some("7736050003"));
        let b = cache_key("registry", "acme llc", Some("7736050003"));
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_by_source() {
        let a = cache_key("registry", "Acme", None);
        let b = cache_key("court", "Acme", None);
        assert_ne!(a, b);
    }
}
