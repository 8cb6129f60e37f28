//! Integration tests against a real Kafka broker.
//!
//! Run with:
//! ```bash
//! docker compose up -d kafka
//! cargo test -p vigil-queue --test kafka_integration -- --ignored
//! ```

use rdkafka::config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::model::AnalysisTask;
use vigil_queue::messages::WorkflowOutcome;
use vigil_queue::{AnalysisConsumer, DlqPublisher, QueueConfig, QueuePublisher};

fn test_config(topic_suffix: &str) -> QueueConfig {
    let mut config = QueueConfig::default();
    config.brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    config.analysis_queue_topic = format!("test-analysis-queue-{topic_suffix}");
    config.analysis_results_topic = format!("test-analysis-results-{topic_suffix}");
    config.dlq_analysis_topic = format!("test-dlq-analysis-{topic_suffix}");
    config.group_id = format!("test-group-{topic_suffix}");
    config
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn publish_and_consume_roundtrip() {
    let config = test_config("roundtrip");
    let publisher = Arc::new(QueuePublisher::new(config.clone()).unwrap());
    let task = AnalysisTask::new("Acme LLC".to_string(), None, None, 5);
    publisher.publish_analysis_task(&task).await.unwrap();

    let dlq = Arc::new(DlqPublisher::new(
        ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .create()
            .unwrap(),
        &config,
    ));
    let consumer = AnalysisConsumer::new(config, publisher.clone(), dlq).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = shutdown_tx.send(());
    });

    let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen_clone = seen.clone();
    consumer
        .run(
            move |_task| {
                let seen = seen_clone.clone();
                async move {
                    seen.store(true, std::sync::atomic::Ordering::SeqCst);
                    let outcome: Result<WorkflowOutcome, vigil_core::VigilError> =
                        Err(vigil_core::VigilError::InternalError("test handler, no persistence wired".to_string()));
                    outcome
                }
            },
            async move {
                let _ = shutdown_rx.await;
            },
        )
        .await;

    assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
}
