//! Per-process worker configuration, written by the controller and read on
//! boot (§4.7 step 2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use aiperf_http::{EndpointConfig, EndpointType, HttpClientConfig};
use aiperf_metrics::SloConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub service_id: String,
    /// Address of the controller's broker (§4.1), e.g. `127.0.0.1:8901`.
    pub bus_addr: String,
    pub model_name: String,
    pub base_url: String,
    pub endpoint_type: SerializableEndpointType,
    pub streaming: bool,
    pub api_key: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub http: HttpClientConfig,
    /// Goodput thresholds (§4.4 Good Request Count), set from `RunConfig`.
    #[serde(default)]
    pub slo: SloConfig,
}

/// A serde-friendly mirror of `aiperf_http::EndpointType`, kept separate so
/// `aiperf-http` doesn't have to derive `Serialize`/`Deserialize` for a type
/// it otherwise only ever constructs in-process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializableEndpointType {
    ChatCompletions,
    Completions,
    Embeddings,
    Responses,
}

impl From<SerializableEndpointType> for EndpointType {
    fn from(value: SerializableEndpointType) -> Self {
        match value {
            SerializableEndpointType::ChatCompletions => EndpointType::ChatCompletions,
            SerializableEndpointType::Completions => EndpointType::Completions,
            SerializableEndpointType::Embeddings => EndpointType::Embeddings,
            SerializableEndpointType::Responses => EndpointType::Responses,
        }
    }
}

impl WorkerConfig {
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            base_url: self.base_url.clone(),
            endpoint_type: self.endpoint_type.into(),
            streaming: self.streaming,
            api_key: self.api_key.clone(),
            extra_headers: self.extra_headers.clone(),
            extra: self.extra.clone(),
        }
    }
}
