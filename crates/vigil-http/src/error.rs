use thiserror::Error;
use vigil_core::VigilError;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HttpCoreError {
    #[error("circuit open for host {0}")]
    CircuitOpen(String),

    #[error("request to {url} timed out after {elapsed:?}")]
    Timeout { url: String, elapsed: std::time::Duration },

    #[error("transport error calling {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("upstream {status} from {url}: {body}")]
    UpstreamStatus { url: String, status: u16, body: String },

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("pagination stopped: {0}")]
    PaginationStopped(String),

    #[error("response body decode error: {0}")]
    Decode(String),

    #[error("request retries exhausted: {0}")]
    RetriesExhausted(String),
}

impl From<HttpCoreError> for VigilError {
    fn from(err: HttpCoreError) -> Self {
        match err {
            HttpCoreError::CircuitOpen(host) => VigilError::CircuitOpen(host),
            HttpCoreError::Timeout { elapsed, .. } => VigilError::Timeout(elapsed),
            HttpCoreError::Transport { source, .. } => VigilError::Transport(source.to_string()),
            HttpCoreError::UpstreamStatus { url, status, body } => VigilError::ProviderError {
                source: url,
                message: format!("HTTP {status}: {body}"),
            },
            HttpCoreError::RateLimited(_) => VigilError::RateLimited,
            HttpCoreError::PaginationStopped(msg) => VigilError::InternalError(msg),
            HttpCoreError::Decode(msg) => VigilError::InternalError(msg),
            HttpCoreError::RetriesExhausted(msg) => VigilError::Transport(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpCoreError>;
