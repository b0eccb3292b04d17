//! HTTP-facing value types and the transport seam
//!
//! The cache never holds on to a live client response. Requests are described by
//! [`Method`] and [`RequestOptions`], and whatever comes back from a [`Transport`]
//! is captured into a [`CachedResponse`] value that can be written to disk and
//! handed back to callers unchanged.

mod method;
mod options;
mod response;
mod transport;

pub use method::{Method, UnknownMethod};
pub use options::{OptionsError, RequestBody, RequestOptions, MAX_EXTENSIONS};
pub use response::CachedResponse;
pub use transport::{ReqwestTransport, Transport, TransportError};
