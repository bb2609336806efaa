//! Parse error taxonomy, converted into the shared [`aiperf_core::Error`] at
//! the crate boundary the same way every other service-crate error does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed SSE frame: {0}")]
    Frame(String),

    #[error("unrecognized response payload: {0}")]
    Payload(String),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl From<ParseError> for aiperf_core::Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Frame(msg) => aiperf_core::Error::Transport(msg),
            ParseError::Payload(msg) => aiperf_core::Error::Transport(msg),
            ParseError::Json(err) => aiperf_core::Error::Serialization(err),
        }
    }
}
