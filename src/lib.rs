//! gcloud-client
//!
//! Typed Google Cloud REST client runtime. The interesting machinery is the
//! shared core every call flows through: service-account authentication with
//! coalesced token refresh, a bounded TTL response cache, per-service circuit
//! breakers and a retrying executor with cancellation at every suspension
//! point. Thin typed wrappers for Storage, Compute and Secret Manager sit on
//! top.
#![deny(unsafe_code)]

pub mod auth;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod coalesce;
pub mod error;
pub mod execution;
pub mod retry;
pub mod services;
pub mod utils;

pub use client::{GoogleCloudClient, GoogleCloudClientBuilder};
pub use error::{ApiError, AuthError, CircuitBreakerError, Error};
