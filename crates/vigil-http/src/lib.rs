//! Resilient HTTP core shared by every outbound provider client: circuit
//! breaker, retry with backoff, cursor pagination, and Prometheus metrics
//! (spec §4.1).

pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod metrics;
pub mod pagination;
pub mod retry;

pub use circuit_breaker::{Admission, CircuitBreakerConfig, CircuitBreakerRegistry};
pub use client::{HttpCore, HttpResponse, RequestOptions, DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT};
pub use error::{HttpCoreError, Result};
pub use retry::RetryConfig;
