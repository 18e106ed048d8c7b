//! Thin typed service wrappers.
//!
//! Each wrapper builds an [`ApiRequest`](crate::execution::ApiRequest) with
//! the right URL, scope and cache key, hands it to the executor and decodes
//! the response. All resilience behavior (auth, caching, breaking, retries)
//! lives in the executor.

pub mod compute;
pub mod secretmanager;
pub mod storage;

pub use compute::ComputeService;
pub use secretmanager::SecretManagerService;
pub use storage::StorageService;
