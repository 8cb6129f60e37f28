//! Dead-letter publishing (spec §4.8, §6.3): once a message exhausts
//! `max_delivery` handler attempts it is wrapped in a [`DlqEnvelope`] and
//! sent to its mirror topic. Grounded in the teacher's
//! `dashflow-streaming::dlq::DlqHandler::send`.

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::messages::{AnalysisDlqEnvelope, CacheDlqEnvelope};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

pub struct DlqPublisher {
    producer: FutureProducer,
    analysis_topic: String,
    cache_topic: String,
    timeout: Duration,
}

impl DlqPublisher {
    pub fn new(producer: FutureProducer, config: &QueueConfig) -> Self {
        Self {
            producer,
            analysis_topic: config.dlq_analysis_topic.clone(),
            cache_topic: config.dlq_cache_topic.clone(),
            timeout: config.send_timeout,
        }
    }

    pub async fn send_analysis(&self, envelope: &AnalysisDlqEnvelope) -> Result<()> {
        let payload = serde_json::to_vec(envelope)?;
        self.send(&self.analysis_topic, &envelope.original.task_id, &payload).await
    }

    pub async fn send_cache(&self, envelope: &CacheDlqEnvelope) -> Result<()> {
        let payload = serde_json::to_vec(envelope)?;
        self.send(&self.cache_topic, &envelope.original.key_prefix, &payload).await
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).payload(payload).key(key);
        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok(_) => {
                tracing::warn!(topic, key, "message moved to dead-letter queue");
                Ok(())
            }
            Err((e, _)) => Err(QueueError::Kafka(e.to_string())),
        }
    }
}
