//! Queue topic and concurrency configuration (spec §6.3, §5).

use std::time::Duration;

/// Number of failed handler attempts before a message moves to its DLQ
/// (spec §4.8: "after the broker's max-delivery retries"). Not specified
/// numerically in spec.md; chosen to match the HTTP core's `max_retries`
/// default (3) plus one extra attempt for handler-level transient errors.
pub const DEFAULT_MAX_DELIVERY: u32 = 4;

/// Default consumer parallelism (spec §5's `max_consumers`=10).
pub const DEFAULT_MAX_CONSUMERS: usize = 10;

/// Default consumer shutdown grace period (spec §5's `graceful_timeout`=30s).
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub brokers: String,
    pub group_id: String,
    pub analysis_queue_topic: String,
    pub analysis_results_topic: String,
    pub cache_queue_topic: String,
    pub dlq_analysis_topic: String,
    pub dlq_cache_topic: String,
    pub max_delivery: u32,
    pub max_consumers: usize,
    pub graceful_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "vigil-analysis".to_string(),
            analysis_queue_topic: "analysis_queue".to_string(),
            analysis_results_topic: "analysis_results".to_string(),
            cache_queue_topic: "cache_queue".to_string(),
            dlq_analysis_topic: "dlq.analysis".to_string(),
            dlq_cache_topic: "dlq.cache".to_string(),
            max_delivery: DEFAULT_MAX_DELIVERY,
            max_consumers: DEFAULT_MAX_CONSUMERS,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl QueueConfig {
    /// Loads broker/group overrides from the environment, mirroring the
    /// teacher's `env_string_or_default` configuration convention.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(brokers) = std::env::var("KAFKA_BROKERS") {
            config.brokers = brokers;
        }
        if let Ok(group_id) = std::env::var("KAFKA_GROUP_ID") {
            config.group_id = group_id;
        }
        if let Ok(max_delivery) = std::env::var("QUEUE_MAX_DELIVERY") {
            if let Ok(v) = max_delivery.parse() {
                config.max_delivery = v;
            }
        }
        if let Ok(max_consumers) = std::env::var("QUEUE_MAX_CONSUMERS") {
            if let Ok(v) = max_consumers.parse() {
                config.max_consumers = v;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_topic_names() {
        let config = QueueConfig::default();
        assert_eq!(config.analysis_queue_topic, "analysis_queue");
        assert_eq!(config.dlq_analysis_topic, "dlq.analysis");
        assert_eq!(config.max_delivery, DEFAULT_MAX_DELIVERY);
    }

    #[test]
    fn from_env_ignores_unparseable_override() {
        std::env::remove_var("QUEUE_MAX_DELIVERY");
        std::env::set_var("QUEUE_MAX_DELIVERY", "not-a-number");
        let config = QueueConfig::from_env();
        assert_eq!(config.max_delivery, DEFAULT_MAX_DELIVERY);
        std::env::remove_var("QUEUE_MAX_DELIVERY");
    }
}
