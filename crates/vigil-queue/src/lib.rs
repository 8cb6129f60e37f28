//! Task queue runtime (spec §4.8, §6.3): publisher, consumer, and
//! dead-letter queue backing the asynchronous analysis path. An alternate
//! entry point to the same workflow state machine the synchronous REST
//! route drives.

pub mod config;
pub mod consumer;
pub mod dlq;
pub mod error;
pub mod idempotency;
pub mod messages;
pub mod producer;

pub use config::QueueConfig;
pub use consumer::AnalysisConsumer;
pub use dlq::DlqPublisher;
pub use error::{QueueError, Result};
pub use idempotency::IdempotencyGuard;
pub use messages::WorkflowOutcome;
pub use producer::QueuePublisher;
