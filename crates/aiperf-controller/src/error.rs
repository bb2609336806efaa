//! Controller error taxonomy (§7): bus/transport failures are communication
//! errors; everything that happens before profiling starts is fatal at
//! startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("bus error: {0}")]
    Bus(#[from] aiperf_core::Error),

    #[error("dataset error: {0}")]
    Dataset(#[from] aiperf_dataset::DatasetError),

    #[error("records manager error: {0}")]
    Records(#[from] aiperf_records::error::RecordsError),

    #[error("timing strategy error: {0}")]
    Timing(#[from] aiperf_timing::TimingError),

    #[error("metric error: {0}")]
    Metric(#[from] aiperf_metrics::MetricError),

    #[error("subprocess I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} did not register within the timeout")]
    RegistrationTimeout(String),

    #[error("{0} did not acknowledge ProfileConfigure within the timeout")]
    ConfigureTimeout(String),

    #[error("service {service_id} failed: {message}")]
    ServiceFailed { service_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, ControllerError>;
