//! Maps [`vigil_core::VigilError`] (and REST-only conditions like "not
//! found") onto HTTP responses shaped `{kind, message, request_id}` (spec
//! §7: "REST returns an error object `{kind, message, request_id}`").

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use vigil_core::{ErrorKind, ErrorPayload, VigilError};

pub struct ApiError {
    status: StatusCode,
    payload: ErrorPayload,
}

impl ApiError {
    pub fn from_vigil(err: &VigilError, request_id: Option<String>) -> Self {
        Self {
            status: status_for_kind(err.kind()),
            payload: ErrorPayload::from_error(err, request_id),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            payload: ErrorPayload {
                kind: ErrorKind::NotFound,
                message: message.into(),
                request_id: None,
            },
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            payload: ErrorPayload {
                kind: ErrorKind::InvalidInput,
                message: message.into(),
                request_id: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            payload: ErrorPayload {
                kind: ErrorKind::InvalidInput,
                message: message.into(),
                request_id: None,
            },
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            payload: ErrorPayload {
                kind: ErrorKind::RateLimited,
                message: message.into(),
                request_id: None,
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            payload: ErrorPayload {
                kind: ErrorKind::InternalError,
                message: message.into(),
                request_id: None,
            },
        }
    }
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout | ErrorKind::WorkflowTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::CircuitOpen | ErrorKind::LlmUnavailable | ErrorKind::StorageUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::Transport | ErrorKind::ProviderError | ErrorKind::SchemaMismatch => StatusCode::BAD_GATEWAY,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        Self::from_vigil(&err, None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.payload)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
