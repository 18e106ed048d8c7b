//! HTTP transport abstraction.
//!
//! The executor talks to an injectable transport rather than to `reqwest`
//! directly, so tests can observe the final URL/headers/body and return
//! synthetic responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::error::ApiError;

/// Transport-level request data.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

/// Transport-level response data. Non-2xx statuses are data, not errors;
/// classification is the executor's job.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A replaceable HTTP transport for JSON requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request, failing only on transport-level problems
    /// (connectivity, timeout); HTTP error statuses come back as responses.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError>;
}

/// The default transport: a shared `reqwest` client (connection pool).
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Apply a per-request timeout on top of any client-level one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout()
                && let Some(timeout) = self.timeout
            {
                ApiError::Timeout {
                    seconds: timeout.as_secs(),
                }
            } else {
                ApiError::from(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
