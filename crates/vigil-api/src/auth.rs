//! Admin authentication (spec §9 open question 3: "constant-time compare
//! against a configured token"; anything richer — roles, rotation — is out
//! of scope). Grounded in the teacher's `auth_context_middleware` shape
//! (`dashflow-registry/src/api/middleware.rs`), simplified to the single
//! admin/non-admin distinction the spec names.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

const AUTH_HEADER: &str = "x-auth-token";

/// Constant-time byte comparison so a timing side-channel can't be used to
/// guess the admin token one byte at a time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Layered only on the admin routes (`DELETE /reports/{id}`,
/// `POST /utility/circuit-breakers/{service}/reset`).
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if constant_time_eq(provided.as_bytes(), state.admin_token.as_bytes()) {
        next.run(request).await
    } else {
        ApiError::unauthorized("missing or invalid X-Auth-Token").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
    }

    #[test]
    fn different_length_tokens_never_match() {
        assert!(!constant_time_eq(b"short", b"much-longer-token"));
    }

    #[test]
    fn single_byte_difference_does_not_match() {
        assert!(!constant_time_eq(b"secret-tokenA", b"secret-tokenB"));
    }
}
