//! HTTP client error taxonomy, converted into the shared [`aiperf_core::Error`]
//! at the crate boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("request payload error: {0}")]
    Payload(String),
}

pub type Result<T> = std::result::Result<T, HttpError>;

impl From<HttpError> for aiperf_core::Error {
    fn from(err: HttpError) -> Self {
        aiperf_core::Error::Transport(err.to_string())
    }
}
