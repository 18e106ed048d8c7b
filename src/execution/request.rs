//! Description of a single API operation.

use reqwest::Method;
use serde_json::Value;

use crate::auth::CLOUD_PLATFORM_SCOPE;
use crate::cache::CacheKey;

/// Everything the executor needs to run one operation: HTTP shape,
/// authentication scopes, an optional cache key and the service name the
/// circuit breaker tracks.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub scopes: Vec<String>,
    pub cache_key: Option<CacheKey>,
    pub service: String,
}

impl ApiRequest {
    pub fn new(method: Method, service: &str, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            scopes: vec![CLOUD_PLATFORM_SCOPE.to_string()],
            cache_key: None,
            service: service.to_string(),
        }
    }

    pub fn get(service: &str, url: impl Into<String>) -> Self {
        Self::new(Method::GET, service, url)
    }

    pub fn post(service: &str, url: impl Into<String>) -> Self {
        Self::new(Method::POST, service, url)
    }

    pub fn delete(service: &str, url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, service, url)
    }

    pub fn patch(service: &str, url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, service, url)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the default cloud-platform scope.
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Mark the response cacheable under `key`. Only GETs are served from
    /// cache.
    pub fn with_cache_key(mut self, key: CacheKey) -> Self {
        self.cache_key = Some(key);
        self
    }

    /// Cacheable = a GET with a cache key.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET && self.cache_key.is_some()
    }
}
