//! Type conversions into the crate error taxonomy.

use super::types::{ApiError, AuthError, Error};

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // `seconds: 0` means the deadline is not known here; the transport
            // overrides it when it knows its configured timeout.
            Self::Timeout { seconds: 0 }
        } else {
            Self::RequestFailed(format!("transport error: {err}"))
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodingError(err.to_string())
    }
}

// Auth errors never cross the executor boundary as such; they are flattened
// into `ApiError` variants. Callers that await a token directly still see the
// full `AuthError`.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenRequestFailed { status, body } => Self::RequestFailed(format!(
                "token exchange failed with HTTP {status}: {body}"
            )),
            AuthError::HttpError { status, .. } => Self::HttpError {
                status,
                envelope: None,
            },
            AuthError::NetworkError(msg) => Self::RequestFailed(msg),
            AuthError::InvalidCredentials(msg) => {
                Self::RequestFailed(format!("invalid credentials: {msg}"))
            }
            AuthError::InvalidPrivateKey(msg) => {
                Self::RequestFailed(format!("invalid private key: {msg}"))
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Api(ApiError::from(err))
    }
}
