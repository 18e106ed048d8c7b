//! Retry policy: status classification and backoff delays.

pub mod policy;

pub use policy::{RETRYABLE_STATUS_CODES, RetryPolicy};
