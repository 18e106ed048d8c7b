//! Cloud Storage: bucket and object metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::error::Error;
use crate::execution::{ApiRequest, RequestExecutor};
use crate::utils::CancelHandle;

const BASE_URL: &str = "https://storage.googleapis.com/storage/v1";
const SERVICE: &str = "storage";

/// A Cloud Storage bucket resource (metadata subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// A Cloud Storage object resource (metadata subset). Sizes come over the
/// wire as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    #[serde(default)]
    items: Vec<Bucket>,
}

/// Typed access to the Cloud Storage JSON API.
#[derive(Clone)]
pub struct StorageService {
    executor: Arc<RequestExecutor>,
    base_url: String,
}

impl StorageService {
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

    /// List the buckets of a project.
    pub async fn list_buckets(&self, project: &str) -> Result<Vec<Bucket>, Error> {
        let url = format!("{}/b?project={}", self.base_url, urlencoding::encode(project));
        let key = cache_key("buckets", &[project])?;
        let response: ListBucketsResponse = self
            .executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await?;
        Ok(response.items)
    }

    /// Fetch one bucket's metadata.
    pub async fn bucket(&self, name: &str) -> Result<Bucket, Error> {
        let url = format!("{}/b/{}", self.base_url, urlencoding::encode(name));
        let key = cache_key("bucket", &[name])?;
        self.executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await
    }

    /// Fetch one object's metadata.
    pub async fn object_metadata(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<ObjectMetadata, Error> {
        let url = format!(
            "{}/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        );
        let key = cache_key("object", &[bucket, object])?;
        self.executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await
    }

    /// Delete an object and drop its cached metadata.
    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), Error> {
        let url = format!(
            "{}/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        );
        self.executor
            .execute_cancellable::<serde_json::Value>(
                ApiRequest::delete(SERVICE, url),
                &CancelHandle::new(),
            )
            .await?;
        self.executor
            .response_cache()
            .remove(&cache_key("object", &[bucket, object])?);
        Ok(())
    }
}

fn cache_key(kind: &str, segments: &[&str]) -> Result<CacheKey, Error> {
    CacheKey::new(SERVICE, kind, segments)
        .map_err(|e| crate::error::ApiError::RequestFailed(e.to_string()).into())
}
