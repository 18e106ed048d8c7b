//! Compute Engine: instance metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::error::Error;
use crate::execution::{ApiRequest, RequestExecutor};

const BASE_URL: &str = "https://compute.googleapis.com/compute/v1";
const SERVICE: &str = "compute";

/// A Compute Engine instance resource (subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListInstancesResponse {
    #[serde(default)]
    items: Vec<Instance>,
}

/// Typed access to the Compute Engine API.
#[derive(Clone)]
pub struct ComputeService {
    executor: Arc<RequestExecutor>,
    base_url: String,
}

impl ComputeService {
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

    /// List the instances in a zone.
    pub async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<Instance>, Error> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(zone)
        );
        let key = cache_key("instances", &[project, zone])?;
        let response: ListInstancesResponse = self
            .executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await?;
        Ok(response.items)
    }

    /// Fetch one instance.
    pub async fn instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Instance, Error> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances/{}",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(zone),
            urlencoding::encode(name)
        );
        let key = cache_key("instance", &[project, zone, name])?;
        self.executor
            .execute(ApiRequest::get(SERVICE, url).with_cache_key(key))
            .await
    }
}

fn cache_key(kind: &str, segments: &[&str]) -> Result<CacheKey, Error> {
    CacheKey::new(SERVICE, kind, segments)
        .map_err(|e| crate::error::ApiError::RequestFailed(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_decodes_wire_shape() {
        let instance: Instance = serde_json::from_value(json!({
            "name": "vm-1",
            "id": "123456789",
            "machineType": "zones/us-central1-a/machineTypes/e2-medium",
            "status": "RUNNING",
            "creationTimestamp": "2024-03-01T08:00:00.500Z"
        }))
        .unwrap();
        assert_eq!(instance.status.as_deref(), Some("RUNNING"));
        assert_eq!(
            instance.creation_timestamp.unwrap().timestamp_subsec_millis(),
            500
        );
    }
}
