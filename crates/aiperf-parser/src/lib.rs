//! Streaming response parser (§4.5): SSE framing, the OpenAI-compatible
//! response extractor, and token-timeline reconstruction into
//! [`aiperf_core::model::ParsedResponseRecord`].

pub mod error;
pub mod openai;
pub mod sse;
pub mod streaming_metrics;

pub use error::ParseError;
pub use sse::{SseFrame, SseReader};
pub use streaming_metrics::reconstruct;
