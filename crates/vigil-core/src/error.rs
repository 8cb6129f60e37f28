//! Error taxonomy shared across the orchestration engine.
//!
//! Every surfaced error carries an [`ErrorKind`] so that REST responses, SSE
//! `error` events, and queue result payloads can all expose the same
//! `{kind, message}` shape regardless of which layer raised it.

use thiserror::Error;

/// Stable, user-facing error classification.
///
/// `Display` renders the exact label used on the wire (REST body, SSE event,
/// queue result) — do not rename variants without updating API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    InvalidInput,
    Timeout,
    CircuitOpen,
    Transport,
    ProviderError,
    RateLimited,
    LlmUnavailable,
    InsufficientData,
    SchemaMismatch,
    WorkflowTimeout,
    Cancelled,
    StorageUnavailable,
    InternalError,
    /// REST-surface-only label: the requested resource does not exist.
    /// Never produced by [`VigilError::kind`] — the orchestration core has
    /// no notion of "not found", only missing `Option`s — but part of the
    /// same wire taxonomy so `vigil-api` can return `{kind, message}`
    /// bodies consistent with every other error response.
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::CircuitOpen => "CircuitOpen",
            ErrorKind::Transport => "Transport",
            ErrorKind::ProviderError => "ProviderError",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::LlmUnavailable => "LLMUnavailable",
            ErrorKind::InsufficientData => "InsufficientData",
            ErrorKind::SchemaMismatch => "SchemaMismatch",
            ErrorKind::WorkflowTimeout => "WorkflowTimeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::StorageUnavailable => "StorageUnavailable",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::NotFound => "NotFound",
        };
        f.write_str(s)
    }
}

/// Error type for the orchestration core.
///
/// Every variant maps to exactly one [`ErrorKind`] via [`VigilError::kind`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("circuit open for host {0}")]
    CircuitOpen(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider {source} returned an error: {message}")]
    ProviderError { source: String, message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("LLM provider cascade exhausted")]
    LlmUnavailable,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("LLM response did not match schema: {0}")]
    SchemaMismatch(String),

    #[error("workflow timed out")]
    WorkflowTimeout,

    #[error("session cancelled")]
    Cancelled,

    #[error("storage backend unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl VigilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VigilError::InvalidInput(_) => ErrorKind::InvalidInput,
            VigilError::Timeout(_) => ErrorKind::Timeout,
            VigilError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            VigilError::Transport(_) => ErrorKind::Transport,
            VigilError::ProviderError { .. } => ErrorKind::ProviderError,
            VigilError::RateLimited => ErrorKind::RateLimited,
            VigilError::LlmUnavailable => ErrorKind::LlmUnavailable,
            VigilError::InsufficientData(_) => ErrorKind::InsufficientData,
            VigilError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            VigilError::WorkflowTimeout => ErrorKind::WorkflowTimeout,
            VigilError::Cancelled => ErrorKind::Cancelled,
            VigilError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            VigilError::InternalError(_) => ErrorKind::InternalError,
        }
    }
}

/// Wire shape for `{kind, message, request_id}` surfaced by REST, SSE, and
/// queue result payloads.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub request_id: Option<String>,
}

impl ErrorPayload {
    pub fn from_error(err: &VigilError, request_id: Option<String>) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            request_id,
        }
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
