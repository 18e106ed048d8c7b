//! Top-level client facade.
//!
//! Wires the authenticator, executor, response cache and breaker registry
//! together behind a builder, and owns their shutdown.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, ServiceAccountCredentials};
use crate::breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::cache::{CacheConfig, CacheKey, CacheObserver, ResponseCache};
use crate::error::Error;
use crate::execution::{HttpTransport, RequestExecutor, ReqwestTransport};
use crate::retry::RetryPolicy;
use crate::services::{ComputeService, SecretManagerService, StorageService};

/// A configured Google Cloud client.
///
/// Cheap to clone pieces out of (everything is `Arc`-shared); call
/// [`shutdown`](GoogleCloudClient::shutdown) when done so cached token
/// material is zeroized deterministically.
pub struct GoogleCloudClient {
    authenticator: Arc<Authenticator>,
    executor: Arc<RequestExecutor>,
    cache: Arc<ResponseCache>,
    breakers: Arc<BreakerRegistry>,
}

impl GoogleCloudClient {
    pub fn builder(credentials: ServiceAccountCredentials) -> GoogleCloudClientBuilder {
        GoogleCloudClientBuilder::new(credentials)
    }

    /// Build with defaults straight from a credential file on disk.
    pub fn from_credentials_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let credentials = ServiceAccountCredentials::from_file(path)?;
        Self::builder(credentials).build()
    }

    pub fn storage(&self) -> StorageService {
        StorageService::new(Arc::clone(&self.executor))
    }

    pub fn compute(&self) -> ComputeService {
        ComputeService::new(Arc::clone(&self.executor))
    }

    pub fn secret_manager(&self) -> SecretManagerService {
        SecretManagerService::new(Arc::clone(&self.executor))
    }

    /// The shared executor, for callers issuing hand-built requests.
    pub fn executor(&self) -> Arc<RequestExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn response_cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Zeroize cached tokens and drop cached responses. Idempotent; safe to
    /// call on every exit path.
    pub fn shutdown(&self) {
        self.authenticator.close();
        self.cache.clear();
    }
}

/// Builder for [`GoogleCloudClient`].
pub struct GoogleCloudClientBuilder {
    credentials: ServiceAccountCredentials,
    http: Option<reqwest::Client>,
    transport: Option<Arc<dyn HttpTransport>>,
    retry: RetryPolicy,
    cache_config: CacheConfig,
    breaker_config: CircuitBreakerConfig,
    refresh_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    cache_observer: Option<Arc<dyn CacheObserver<CacheKey>>>,
}

impl GoogleCloudClientBuilder {
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            credentials,
            http: None,
            transport: None,
            retry: RetryPolicy::default(),
            cache_config: CacheConfig::default(),
            breaker_config: CircuitBreakerConfig::default(),
            refresh_timeout: None,
            request_timeout: None,
            cache_observer: None,
        }
    }

    /// Share an existing `reqwest` client (connection pool) for both the
    /// token exchange and, unless a custom transport is set, API traffic.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the HTTP transport entirely (testing, instrumentation).
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Token-exchange timeout (default 30 s).
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Per-request timeout on the default transport.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_cache_observer(mut self, observer: Arc<dyn CacheObserver<CacheKey>>) -> Self {
        self.cache_observer = Some(observer);
        self
    }

    /// Validate the credentials and assemble the client.
    pub fn build(self) -> Result<GoogleCloudClient, Error> {
        self.credentials.validate().map_err(Error::Auth)?;
        let http = self.http.unwrap_or_default();

        let mut authenticator = Authenticator::with_http_client(self.credentials, http.clone())?;
        if let Some(timeout) = self.refresh_timeout {
            authenticator = authenticator.with_refresh_timeout(timeout);
        }
        let authenticator = Arc::new(authenticator);

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut transport = ReqwestTransport::new(http);
                if let Some(timeout) = self.request_timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport)
            }
        };

        let cache = Arc::new(match self.cache_observer {
            Some(observer) => ResponseCache::with_observer(self.cache_config, observer),
            None => ResponseCache::new(self.cache_config),
        });
        let breakers = Arc::new(BreakerRegistry::new(self.breaker_config));

        let executor = Arc::new(RequestExecutor::new(
            transport,
            Arc::clone(&authenticator),
            Arc::clone(&cache),
            Arc::clone(&breakers),
            self.retry,
        ));

        Ok(GoogleCloudClient {
            authenticator,
            executor,
            cache,
            breakers,
        })
    }
}
