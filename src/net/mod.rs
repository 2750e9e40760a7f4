//! HTTP plumbing shared by the request queuer, sync engine and cache layer.
//!
//! Everything that touches the network goes through the [`Transport`] trait so
//! the offline paths can be exercised with a scripted transport in tests.

mod transport;
mod types;

#[cfg(test)]
pub mod mock;

pub use transport::{ReqwestTransport, Transport};
#[cfg(test)]
pub use transport::TransportError;
pub use types::{resolve_url, HttpRequest, HttpResponse};
