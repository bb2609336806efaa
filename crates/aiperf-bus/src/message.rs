//! Typed, discriminated messages carried on the bus (§4.1, §6)
//!
//! Every message is a single JSON object tagged by `message_type`: one
//! externally-tagged enum whose variants each carry the shared envelope
//! fields (`service_id`, `request_ns`, optional `request_id`/
//! `target_service_id`/`target_service_type`) alongside their own payload.

use aiperf_core::model::{
    Conversation, CreditPhase, CreditPhaseStats, ErrorDetails, MetricValue, RecordMetadata,
    WorkerStats,
};
use aiperf_core::PerfNs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandResponseStatus {
    Success,
    Acknowledged,
    Failure,
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Starting,
    Healthy,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecordPayload {
    pub metadata: RecordMetadata,
    pub values: HashMap<String, MetricValue>,
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecordsResultPayload {
    pub results: Vec<aiperf_metrics_api::MetricResultDto>,
    pub error_counts: HashMap<String, u64>,
    pub was_cancelled: bool,
}

/// Minimal mirror of `aiperf-metrics::MetricResult`, kept dependency-free here
/// so `aiperf-bus` does not need to depend on `aiperf-metrics`.
pub mod aiperf_metrics_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MetricResultDto {
        pub tag: String,
        pub header: String,
        pub unit: String,
        pub count: u64,
        pub min: Option<f64>,
        pub max: Option<f64>,
        pub avg: f64,
        pub std: Option<f64>,
        pub p1: Option<f64>,
        pub p5: Option<f64>,
        pub p25: Option<f64>,
        pub p50: Option<f64>,
        pub p75: Option<f64>,
        pub p90: Option<f64>,
        pub p95: Option<f64>,
        pub p99: Option<f64>,
    }
}

/// Discriminated message union exchanged on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum Message {
    RegisterService {
        service_id: String,
        request_ns: PerfNs,
        service_type: String,
    },
    ProfileConfigure {
        service_id: String,
        request_ns: PerfNs,
        request_id: Option<String>,
        config_path: String,
    },
    ProfileStart {
        service_id: String,
        request_ns: PerfNs,
    },
    ProfileCancel {
        service_id: String,
        request_ns: PerfNs,
    },
    Shutdown {
        service_id: String,
        request_ns: PerfNs,
    },
    ShutdownWorkers {
        service_id: String,
        request_ns: PerfNs,
        count: usize,
    },
    SpawnWorkers {
        service_id: String,
        request_ns: PerfNs,
        count: usize,
    },
    Heartbeat {
        service_id: String,
        request_ns: PerfNs,
    },
    Status {
        service_id: String,
        request_ns: PerfNs,
        status: ServiceStatus,
        detail: Option<String>,
    },
    CreditDrop {
        service_id: String,
        request_ns: PerfNs,
        phase: CreditPhase,
        conversation_id: Option<String>,
        turn_index: usize,
        should_cancel: bool,
        cancel_after_ns: Option<PerfNs>,
        credit_drop_perf_ns: PerfNs,
        conversation_num: u64,
    },
    CreditReturn {
        service_id: String,
        request_ns: PerfNs,
        conversation_num: u64,
        errored: bool,
    },
    CreditsComplete {
        service_id: String,
        request_ns: PerfNs,
        phase: CreditPhase,
        stats: CreditPhaseStats,
    },
    ConversationRequest {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
        conversation_id: Option<String>,
    },
    ConversationResponse {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
        conversation: Option<Conversation>,
    },
    ConversationTurnRequest {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
        conversation_id: String,
        turn_index: usize,
    },
    ConversationTurnResponse {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
        turn_json: Option<String>,
    },
    MetricRecords {
        service_id: String,
        request_ns: PerfNs,
        record: MetricRecordPayload,
    },
    RealtimeMetrics {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
    },
    ProcessRecordsResult {
        service_id: String,
        request_ns: PerfNs,
        result: ProcessRecordsResultPayload,
    },
    ServiceFailed {
        service_id: String,
        request_ns: PerfNs,
        message: String,
        fatal: bool,
    },
    CommandResponse {
        service_id: String,
        request_ns: PerfNs,
        request_id: String,
        status: CommandResponseStatus,
        detail: Option<String>,
    },
    WorkerStats {
        service_id: String,
        request_ns: PerfNs,
        stats: WorkerStats,
    },
}

impl Message {
    pub fn service_id(&self) -> &str {
        match self {
            Message::RegisterService { service_id, .. }
            | Message::ProfileConfigure { service_id, .. }
            | Message::ProfileStart { service_id, .. }
            | Message::ProfileCancel { service_id, .. }
            | Message::Shutdown { service_id, .. }
            | Message::ShutdownWorkers { service_id, .. }
            | Message::SpawnWorkers { service_id, .. }
            | Message::Heartbeat { service_id, .. }
            | Message::Status { service_id, .. }
            | Message::CreditDrop { service_id, .. }
            | Message::CreditReturn { service_id, .. }
            | Message::CreditsComplete { service_id, .. }
            | Message::ConversationRequest { service_id, .. }
            | Message::ConversationResponse { service_id, .. }
            | Message::ConversationTurnRequest { service_id, .. }
            | Message::ConversationTurnResponse { service_id, .. }
            | Message::MetricRecords { service_id, .. }
            | Message::RealtimeMetrics { service_id, .. }
            | Message::ProcessRecordsResult { service_id, .. }
            | Message::ServiceFailed { service_id, .. }
            | Message::CommandResponse { service_id, .. }
            | Message::WorkerStats { service_id, .. } => service_id,
        }
    }

    /// The `request_id` a request/reply handler must echo back, if this
    /// message carries one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Message::ProfileConfigure { request_id, .. } => request_id.as_deref(),
            Message::ConversationRequest { request_id, .. }
            | Message::ConversationResponse { request_id, .. }
            | Message::ConversationTurnRequest { request_id, .. }
            | Message::ConversationTurnResponse { request_id, .. }
            | Message::RealtimeMetrics { request_id, .. }
            | Message::CommandResponse { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

/// Decode a message from its JSON-line wire form. A thin wrapper kept
/// separate from `serde_json::from_str` so callers have one place to attach
/// a `ClientNotFound`/`UnknownMessageType`-flavored error in the future.
pub fn decode(line: &str) -> Result<Message, aiperf_core::Error> {
    serde_json::from_str(line)
        .map_err(|e| aiperf_core::Error::UnknownMessageType(format!("{e}: {line}")))
}

pub fn encode(message: &Message) -> Result<String, aiperf_core::Error> {
    serde_json::to_string(message).map_err(aiperf_core::Error::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let msg = Message::Heartbeat {
            service_id: "worker-0".into(),
            request_ns: 42,
        };
        let line = encode(&msg).unwrap();
        assert!(line.contains("\"message_type\":\"Heartbeat\""));
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.service_id(), "worker-0");
    }

    #[test]
    fn request_id_is_echoed_field() {
        let msg = Message::ConversationRequest {
            service_id: "worker-1".into(),
            request_ns: 1,
            request_id: "req-9".into(),
            conversation_id: Some("c1".into()),
        };
        assert_eq!(msg.request_id(), Some("req-9"));
    }

    #[test]
    fn unknown_payload_is_unknown_message_type_error() {
        let err = decode("{\"message_type\":\"NotARealType\"}").unwrap_err();
        assert!(matches!(err, aiperf_core::Error::UnknownMessageType(_)));
    }
}
