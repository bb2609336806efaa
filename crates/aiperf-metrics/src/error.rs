//! Metric-engine-local error type, converted into [`aiperf_core::Error`] at
//! the boundary with other crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    /// A metric's `required_metrics` were not all present in the current
    /// record dict. Skipped silently by the evaluator, not surfaced to callers.
    #[error("no value for metric {0}")]
    NoValue(String),

    #[error("metric type error ({tag}): {message}")]
    Type { tag: String, message: String },

    #[error("metric unit error ({tag}): {message}")]
    Unit { tag: String, message: String },

    #[error("metric dependency graph is not a DAG: cycle through {0}")]
    Cycle(String),

    #[error("unknown metric tag: {0}")]
    UnknownTag(String),
}

impl From<MetricError> for aiperf_core::Error {
    fn from(e: MetricError) -> Self {
        match e {
            MetricError::NoValue(tag) => aiperf_core::Error::NoMetricValue(tag),
            MetricError::Type { tag, message } => aiperf_core::Error::MetricType { tag, message },
            MetricError::Unit { tag, message } => aiperf_core::Error::MetricUnit { tag, message },
            MetricError::Cycle(tag) => aiperf_core::Error::MetricType {
                tag,
                message: "dependency cycle".into(),
            },
            MetricError::UnknownTag(tag) => aiperf_core::Error::MetricType {
                tag,
                message: "unknown tag".into(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricError>;
