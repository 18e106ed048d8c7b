//! Request execution: transport abstraction, request description and the
//! retrying executor that threads authentication, caching and circuit
//! breaking together.

pub mod executor;
pub mod request;
pub mod transport;

pub use executor::RequestExecutor;
pub use request::ApiRequest;
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
