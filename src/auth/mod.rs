//! Authentication: service-account credentials, JWT assertion minting and
//! OAuth2 token exchange with refresh-ahead caching.

pub mod authenticator;
pub mod credentials;
pub mod jwt;
pub mod secure;

pub use authenticator::{AccessToken, Authenticator, CLOUD_PLATFORM_SCOPE};
pub use credentials::ServiceAccountCredentials;
pub use secure::{SecureBuffer, SecureBufferError};
