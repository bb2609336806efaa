//! Error taxonomy shared across AIPerf services
//!
//! Follows the error taxonomy from the design: communication, configuration,
//! dataset, service lifecycle, tokenizer, metric, and transport errors. Each
//! downstream crate defines its own narrow error enum and converts into this
//! one via `#[from]`, the same way crate-local errors elsewhere in the
//! workspace layer over this shared `Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Communication errors (bus init/publish/subscribe/push/pull/request/response)
    #[error("Bus init error: {0}")]
    BusInit(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Push error: {0}")]
    Push(String),

    #[error("Pull error: {0}")]
    Pull(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Response error: {0}")]
    Response(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    // Configuration errors
    #[error("Configuration load error: {0}")]
    ConfigLoad(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    // Dataset generator errors
    #[error("Dataset init error: {0}")]
    DatasetInit(String),

    #[error("Dataset configuration error: {0}")]
    DatasetConfig(String),

    // Service lifecycle errors
    #[error("Service init error ({service}): {message}")]
    ServiceInit { service: String, message: String },

    #[error("Service start error ({service}): {message}")]
    ServiceStart { service: String, message: String },

    #[error("Service stop error ({service}): {message}")]
    ServiceStop { service: String, message: String },

    #[error("Service registration error ({service}): {message}")]
    ServiceRegistration { service: String, message: String },

    #[error("Service run error ({service}): {message}")]
    ServiceRun { service: String, message: String },

    // Tokenizer errors
    #[error("Tokenizer init error: {0}")]
    TokenizerInit(String),

    // Metric errors
    #[error("No metric value for {0}")]
    NoMetricValue(String),

    #[error("Metric type error ({tag}): {message}")]
    MetricType { tag: String, message: String },

    #[error("Metric unit error ({tag}): {message}")]
    MetricUnit { tag: String, message: String },

    // Transport errors on inference calls
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Service-lifecycle failure surfaced to the controller via `ServiceFailed`
/// and aggregated into the final exit-error list (§7).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExitErrorInfo {
    pub service_id: String,
    pub message: String,
    pub fatal: bool,
}
