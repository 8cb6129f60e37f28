//! Process configuration, loaded from the environment (spec §9's "explicit
//! service context" note, extended to process bootstrap). Mirrors the
//! teacher's `env_string_or_default`/`env_is_set` convention
//! (`dashflow-factories`) rather than a config file or CLI flags for
//! per-dependency settings — those stay environment-driven so the same
//! binary runs unmodified across deploy environments.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

fn env_string_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_is_set(key: &str) -> bool {
    std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false)
}

fn env_parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_ip: IpAddr,
    pub bind_port: u16,
    pub admin_token: String,
    pub redis_url: Option<String>,
    pub registry_base_url: String,
    pub registry_api_key: Option<String>,
    pub court_base_url: String,
    pub court_api_key: Option<String>,
    pub analytics_base_url: String,
    pub analytics_api_key: Option<String>,
    pub queue: vigil_queue::QueueConfig,
    /// When unset, `vigil serve` runs HTTP-only and `POST
    /// /agent/analyze-client/async` returns `StorageUnavailable` (spec §6.1);
    /// `vigil worker` refuses to start.
    pub queue_enabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_ip: env_string_or_default("VIGIL_BIND_IP", "0.0.0.0")
                .parse()
                .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))),
            bind_port: env_parse_or_default("VIGIL_BIND_PORT", 8080u16),
            admin_token: env_string_or_default("VIGIL_ADMIN_TOKEN", ""),
            redis_url: std::env::var("REDIS_URL").ok(),
            registry_base_url: env_string_or_default(
                "REGISTRY_API_BASE_URL",
                "https://registry.example.gov/api/v1",
            ),
            registry_api_key: std::env::var("REGISTRY_API_KEY").ok(),
            court_base_url: env_string_or_default(
                "COURT_API_BASE_URL",
                "https://court.example.gov/api/v1",
            ),
            court_api_key: std::env::var("COURT_API_KEY").ok(),
            analytics_base_url: env_string_or_default(
                "ANALYTICS_API_BASE_URL",
                "https://analytics.example.com/api/v1",
            ),
            analytics_api_key: std::env::var("ANALYTICS_API_KEY").ok(),
            queue: vigil_queue::QueueConfig::from_env(),
            queue_enabled: env_is_set("KAFKA_BROKERS"),
        }
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(env_parse_or_default("VIGIL_WORKFLOW_TIMEOUT_SECS", 300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_port_is_8080() {
        std::env::remove_var("VIGIL_BIND_PORT");
        let config = Config::from_env();
        assert_eq!(config.bind_port, 8080);
    }

    #[test]
    fn queue_disabled_without_kafka_brokers() {
        std::env::remove_var("KAFKA_BROKERS");
        let config = Config::from_env();
        assert!(!config.queue_enabled);
    }
}
