//! Queue publisher (spec §4.8): creates `AnalysisTask`s, enqueues them, and
//! fans out results/cache-invalidation jobs. Grounded in the teacher's
//! `dashflow-streaming::producer::DashStreamProducer`'s use of
//! `rdkafka::producer::FutureProducer` + `FutureRecord`, simplified from
//! protobuf-over-Kafka to JSON-over-Kafka for this workspace's message
//! shapes.

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::messages::{AnalysisResultMessage, CacheInvalidationJob};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use vigil_core::model::AnalysisTask;

pub struct QueuePublisher {
    producer: FutureProducer,
    config: QueueConfig,
}

impl QueuePublisher {
    pub fn new(config: QueueConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", config.send_timeout.as_millis().to_string())
            .create()
            .map_err(|e| QueueError::Kafka(e.to_string()))?;
        Ok(Self { producer, config })
    }

    /// Enqueues a task on `analysis_queue`, keyed by `task_id` so retries of
    /// the same task land on the same partition.
    pub async fn publish_analysis_task(&self, task: &AnalysisTask) -> Result<()> {
        let payload = serde_json::to_vec(task)?;
        self.send(&self.config.analysis_queue_topic, &task.task_id, &payload).await
    }

    pub async fn publish_result(&self, result: &AnalysisResultMessage) -> Result<()> {
        let payload = serde_json::to_vec(result)?;
        self.send(&self.config.analysis_results_topic, &result.task_id, &payload).await
    }

    pub async fn publish_cache_invalidation(&self, job: &CacheInvalidationJob) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        self.send(&self.config.cache_queue_topic, &job.key_prefix, &payload).await
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).payload(payload).key(key);
        match self.producer.send(record, Timeout::After(self.config.send_timeout)).await {
            Ok(_) => Ok(()),
            Err((e, _)) => Err(QueueError::Kafka(e.to_string())),
        }
    }
}
