//! Error handling types for the client runtime.
//!
//! This module is intentionally dependency-light and shared across the crate:
//! - `AuthError` for credential loading, validation and token exchange
//! - `ApiError` for request execution and response decoding
//! - `CircuitBreakerError` for breaker rejections
//! - `Error` as the umbrella type returned by the executor and service wrappers

mod conversions;
pub mod types;

pub use types::*;
