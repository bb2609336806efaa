//! Records manager error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("bus error: {0}")]
    Bus(#[from] aiperf_core::Error),

    #[error("io error writing {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("metric error: {0}")]
    Metric(#[from] aiperf_metrics::MetricError),
}

pub type Result<T> = std::result::Result<T, RecordsError>;
