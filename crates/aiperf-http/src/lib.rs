//! HTTP/SSE client (§4.5, §5 Resource policy): connection pooling, endpoint
//! request converters, and timed request issuance.

pub mod client;
pub mod converters;
pub mod error;
pub mod sse_client;

pub use client::{create_client, HttpClientConfig};
pub use converters::{build_payload, EndpointConfig, EndpointType};
pub use error::HttpError;
pub use sse_client::{issue_request, RequestParams};
