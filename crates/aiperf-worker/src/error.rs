//! Worker error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("bus error: {0}")]
    Bus(#[from] aiperf_core::Error),

    #[error("dataset error: {0}")]
    Dataset(#[from] aiperf_dataset::DatasetError),

    #[error("http client error: {0}")]
    Http(#[from] aiperf_http::HttpError),

    #[error("response parsing error: {0}")]
    Parse(#[from] aiperf_parser::ParseError),

    #[error("metric registry error: {0}")]
    Metric(#[from] aiperf_metrics::MetricError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
