//! Credit-serving worker process (§4.3): pulls credits off the bus, drives
//! one HTTP/SSE request per credit, and publishes the resulting metric
//! record.

pub mod config;
pub mod error;
pub mod worker;

pub use config::{SerializableEndpointType, WorkerConfig};
pub use error::WorkerError;
pub use worker::Worker;
