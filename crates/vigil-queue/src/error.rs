use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("kafka error: {0}")]
    Kafka(String),

    #[error("message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue send timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, QueueError>;

impl From<QueueError> for vigil_core::VigilError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Kafka(msg) => vigil_core::VigilError::Transport(msg),
            QueueError::Serialization(e) => vigil_core::VigilError::InternalError(e.to_string()),
            QueueError::Timeout(d) => vigil_core::VigilError::Timeout(d),
        }
    }
}
