//! Timing strategy error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimingError {
    #[error("bus error: {0}")]
    Bus(#[from] aiperf_core::Error),

    #[error("invalid strategy configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TimingError>;
