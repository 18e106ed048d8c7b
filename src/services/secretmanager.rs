//! Secret Manager: secret metadata and version access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::SecureBuffer;
use crate::cache::CacheKey;
use crate::error::{ApiError, Error};
use crate::execution::{ApiRequest, RequestExecutor};

const BASE_URL: &str = "https://secretmanager.googleapis.com/v1";
const SERVICE: &str = "secretmanager";

/// A Secret Manager secret resource (metadata subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Typed access to the Secret Manager API.
#[derive(Clone)]
pub struct SecretManagerService {
    executor: Arc<RequestExecutor>,
    base_url: String,
}

impl SecretManagerService {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self {
            executor,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Override the API endpoint (private service connect, testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a secret's metadata (never its payload).
    pub async fn secret(&self, project: &str, name: &str) -> Result<Secret, Error> {
        let url = format!(
            "{}/projects/{}/secrets/{}",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(name)
        );
        let key = CacheKey::new(SERVICE, "secret", &[project, name])
            .map_err(|e| Error::Api(ApiError::RequestFailed(e.to_string())))?;
        self.executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await
    }

    /// Access a secret version's payload. The decoded bytes land directly in
    /// a [`SecureBuffer`] and the response is never cached.
    pub async fn access_secret_version(
        &self,
        project: &str,
        name: &str,
        version: &str,
    ) -> Result<SecureBuffer, Error> {
        let url = format!(
            "{}/projects/{}/secrets/{}/versions/{}:access",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(name),
            urlencoding::encode(version)
        );
        let response: AccessSecretVersionResponse = self
            .executor
            .execute(ApiRequest::get(SERVICE, url))
            .await?;
        SecureBuffer::from_base64(&response.payload.data)
            .map_err(|e| Error::Api(ApiError::DecodingError(e.to_string())))
    }
}
