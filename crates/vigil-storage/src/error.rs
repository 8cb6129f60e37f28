use thiserror::Error;
use vigil_core::VigilError;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("compression error: {0}")]
    CompressionError(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::CommandError(err.to_string())
    }
}

impl From<StorageError> for VigilError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionError(msg) => VigilError::StorageUnavailable(msg),
            StorageError::CommandError(msg) => VigilError::StorageUnavailable(msg),
            StorageError::SerializationError(msg) | StorageError::DeserializationError(msg) => {
                VigilError::InternalError(msg)
            }
            StorageError::CompressionError(msg) => VigilError::InternalError(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
