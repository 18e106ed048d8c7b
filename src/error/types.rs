//! Core error types.
//!
//! Three discriminated taxonomies cover the runtime: authentication
//! (`AuthError`), request execution (`ApiError`) and circuit breaking
//! (`CircuitBreakerError`). `Error` is the umbrella returned by the executor;
//! every variant exposes a `recovery_suggestion()` aimed at operators reading
//! logs rather than at programs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Google Cloud structured error envelope: `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// The `error` object inside a Google Cloud error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

/// Authentication errors: credential loading, validation and token exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// A required credential field is missing or malformed.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The private key is not a usable PKCS#8 PEM block.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token request failed with HTTP {status}: {body}")]
    TokenRequestFailed { status: u16, body: String },

    /// An auxiliary HTTP call during authentication failed.
    #[error("HTTP {status} during authentication: {body}")]
    HttpError { status: u16, body: String },

    /// The token endpoint could not be reached.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl AuthError {
    /// Human-readable hint on how to get unstuck.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidCredentials(_) => {
                "check the service account JSON file for missing or malformed fields"
            }
            Self::InvalidPrivateKey(_) => {
                "verify the private_key field contains a complete PKCS#8 PEM block"
            }
            Self::TokenRequestFailed { status: 401, .. } | Self::HttpError { status: 401, .. } => {
                "verify service account permissions"
            }
            Self::TokenRequestFailed { .. } | Self::HttpError { .. } => {
                "inspect the token endpoint response; the service account may be disabled"
            }
            Self::NetworkError(_) => "check network connectivity",
        }
    }
}

/// Request execution errors surfaced by the executor and service wrappers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The request could not be completed (transport failure, exhausted
    /// retries without an HTTP status, ...).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// A non-2xx HTTP response. The envelope is present when the body carried
    /// a parseable Google Cloud error object.
    #[error("HTTP {status}: {}", http_error_message(.envelope))]
    HttpError {
        status: u16,
        envelope: Option<ErrorEnvelope>,
    },

    /// The caller cancelled the operation.
    #[error("operation was cancelled")]
    Cancelled,

    /// The operation exceeded its configured deadline.
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The response body could not be decoded into the expected type.
    #[error("failed to decode response: {0}")]
    DecodingError(String),
}

fn http_error_message(envelope: &Option<ErrorEnvelope>) -> String {
    match envelope {
        Some(env) => env.error.message.clone(),
        None => "no error details".to_string(),
    }
}

impl ApiError {
    /// Build an `HttpError` from a status code and a raw response body,
    /// attaching the structured envelope when the body parses as one.
    pub fn http(status: u16, body: &[u8]) -> Self {
        let envelope = serde_json::from_slice::<ErrorEnvelope>(body).ok();
        Self::HttpError { status, envelope }
    }

    /// The HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable hint on how to get unstuck.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::HttpError { status: 401, .. } => "verify the service account credentials",
            Self::HttpError { status: 403, .. } => {
                "verify the service account has the required IAM permissions"
            }
            Self::HttpError { status: 429, .. } => "wait and retry; the project is rate limited",
            Self::HttpError { status, .. } if *status >= 500 => {
                "retry later; the service reported an internal error"
            }
            Self::HttpError { .. } => "inspect the error envelope for details",
            Self::RequestFailed(_) => "check network connectivity and the request URL",
            Self::Cancelled => "the caller cancelled; re-issue the request if still needed",
            Self::Timeout { .. } => "increase the request timeout or retry",
            Self::DecodingError(_) => {
                "the response did not match the expected schema; check API and client versions"
            }
        }
    }
}

/// Circuit breaker rejections.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CircuitBreakerError {
    /// The named circuit is open; retry after the remaining cooldown.
    #[error("circuit for {service} is open; retry in {:.1}s", .remaining.as_secs_f64())]
    CircuitOpen { service: String, remaining: Duration },

    /// The named service accumulated too many failures inside the window.
    #[error("too many failures for {service}: {count}")]
    TooManyFailures { service: String, count: usize },
}

impl CircuitBreakerError {
    /// Human-readable hint on how to get unstuck.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => {
                "wait for the cooldown to elapse; the breaker will admit a probe request"
            }
            Self::TooManyFailures { .. } => {
                "investigate the downstream service; reset the breaker once it recovers"
            }
        }
    }
}

/// Umbrella error returned by the executor and the service wrappers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    CircuitBreaker(#[from] CircuitBreakerError),
}

impl Error {
    /// Human-readable hint on how to get unstuck.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.recovery_suggestion(),
            Self::Api(e) => e.recovery_suggestion(),
            Self::CircuitBreaker(e) => e.recovery_suggestion(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_envelope_message() {
        let body = br#"{"error":{"code":404,"message":"bucket not found","status":"NOT_FOUND"}}"#;
        let err = ApiError::http(404, body);
        assert_eq!(err.to_string(), "HTTP 404: bucket not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn http_error_without_envelope_still_displays() {
        let err = ApiError::http(502, b"<html>bad gateway</html>");
        assert_eq!(err.to_string(), "HTTP 502: no error details");
    }

    #[test]
    fn envelope_round_trips() {
        let json = r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED","errors":[{"reason":"forbidden"}]}}"#;
        let env: ErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.error.code, 403);
        let back = serde_json::to_string(&env).unwrap();
        let again: ErrorEnvelope = serde_json::from_str(&back).unwrap();
        assert_eq!(env, again);
    }

    #[test]
    fn recovery_suggestions_depend_on_status() {
        let unauthorized = ApiError::HttpError {
            status: 401,
            envelope: None,
        };
        assert!(unauthorized.recovery_suggestion().contains("credentials"));

        let forbidden = ApiError::HttpError {
            status: 403,
            envelope: None,
        };
        assert!(forbidden.recovery_suggestion().contains("permissions"));

        let throttled = ApiError::HttpError {
            status: 429,
            envelope: None,
        };
        assert!(throttled.recovery_suggestion().contains("wait"));

        let auth = AuthError::NetworkError("dns failure".into());
        assert!(auth.recovery_suggestion().contains("network"));
    }

    #[test]
    fn breaker_errors_display_service_and_cooldown() {
        let open = CircuitBreakerError::CircuitOpen {
            service: "storage".into(),
            remaining: Duration::from_millis(1500),
        };
        assert_eq!(open.to_string(), "circuit for storage is open; retry in 1.5s");

        let too_many = CircuitBreakerError::TooManyFailures {
            service: "compute".into(),
            count: 7,
        };
        assert_eq!(too_many.to_string(), "too many failures for compute: 7");
    }
}
