//! M2X API client.
//!
//! The dispatcher talks to the API through the `ApiClient` trait; `M2xClient` is the
//! reqwest implementation against the hosted M2X v2 endpoint.

mod m2x;
mod request;

pub use m2x::{ApiClient, ClientError, M2xClient, DEFAULT_ENDPOINT};
pub use request::{ApiRequest, ApiResponse, Verb};
pub(crate) use request::is_relative_segment;
