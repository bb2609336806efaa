//! Shared data model (§3): conversations, credits, records, and progress
//! snapshots passed between services on the bus.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::PerfNs;

/// One piece of named, possibly-batched per-turn content (text/image/audio).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TurnContent {
    pub contents: Vec<String>,
}

impl TurnContent {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            contents: vec![value.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    #[serde(default)]
    pub text: TurnContent,
    #[serde(default)]
    pub image: TurnContent,
    #[serde(default)]
    pub audio: TurnContent,
    pub role: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub delay_ms: Option<i64>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
}

/// An immutable, ordered sequence of turns identified by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub conversation_id: String,
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn turn(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }
}

/// WARMUP is discarded, PROFILING is measured (§2 Glossary: Phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPhase {
    Warmup,
    Profiling,
}

/// A scheduling token representing one request to issue (§3 Credit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub phase: CreditPhase,
    pub conversation_id: Option<String>,
    pub turn_index: usize,
    pub should_cancel: bool,
    pub cancel_after_ns: Option<PerfNs>,
    pub credit_drop_perf_ns: PerfNs,
    pub conversation_num: u64,
}

/// Transport/provider error attached to a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: Option<u16>,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// One raw chunk of an HTTP response: either a whole text blob (non-streaming)
/// or a list of raw SSE message bodies (streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawResponse {
    Text(String),
    SseMessages(Vec<String>),
}

/// Raw timing and raw bytes from one HTTP call (§3 RequestRecord).
///
/// Invariant: if `error` is `None` then `end_perf_ns >= start_perf_ns`, at
/// least one response exists, and every response timestamp in the parsed
/// record derived from it lies within `[start_perf_ns, end_perf_ns]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub conversation_id: String,
    pub turn_index: usize,
    pub model_name: String,
    pub start_perf_ns: PerfNs,
    pub end_perf_ns: PerfNs,
    pub recv_start_perf_ns: Option<PerfNs>,
    pub status: Option<u16>,
    pub responses: Vec<RawResponse>,
    pub error: Option<ErrorDetails>,
    pub delayed: bool,
    pub cancelled: bool,
    pub worker_id: Option<String>,
    pub credit_num: u64,
}

impl RequestRecord {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.responses.is_empty() && self.end_perf_ns >= self.start_perf_ns
    }
}

/// Tagged content variant carried by one parsed SSE frame or non-streaming body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    Text(String),
    Reasoning { content: String, reasoning: String },
    Embedding(Vec<f32>),
    MetricsOnly,
}

impl ResponseData {
    pub fn is_reasoning(&self) -> bool {
        matches!(self, ResponseData::Reasoning { .. })
    }

    pub fn text_len(&self) -> usize {
        match self {
            ResponseData::Text(t) => t.len(),
            ResponseData::Reasoning { content, .. } => content.len(),
            _ => 0,
        }
    }
}

/// One parsed response carrying a monotonic timestamp (§3 ParsedResponse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub perf_ns: PerfNs,
    pub data: ResponseData,
}

/// Parser output for one request: the originating record plus parsed
/// responses ordered by `perf_ns` non-decreasing (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResponseRecord {
    pub request: RequestRecord,
    pub responses: Vec<ParsedResponse>,
    pub input_token_count: Option<u64>,
    pub output_token_count: Option<u64>,
    pub reasoning_token_count: Option<u64>,
}

impl ParsedResponseRecord {
    pub fn is_streaming(&self) -> bool {
        self.responses.len() > 1
    }

    pub fn first_response_ns(&self) -> Option<PerfNs> {
        self.responses.first().map(|r| r.perf_ns)
    }

    pub fn last_response_ns(&self) -> Option<PerfNs> {
        self.responses.last().map(|r| r.perf_ns)
    }

    /// First response whose content is not a reasoning block (Time to First Output).
    pub fn first_non_reasoning_ns(&self) -> Option<PerfNs> {
        self.responses
            .iter()
            .find(|r| !r.data.is_reasoning())
            .map(|r| r.perf_ns)
    }
}

/// Progress snapshot for one credit phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditPhaseStats {
    pub total_expected: Option<u64>,
    pub sent: u64,
    pub completed: u64,
    pub errors: u64,
    pub start_perf_ns: Option<PerfNs>,
    pub end_perf_ns: Option<PerfNs>,
}

impl CreditPhaseStats {
    pub fn rate_per_sec(&self) -> Option<f64> {
        let start = self.start_perf_ns?;
        let end = self.end_perf_ns.unwrap_or(start);
        let elapsed_s = (end - start) as f64 / 1e9;
        if elapsed_s <= 0.0 {
            None
        } else {
            Some(self.completed as f64 / elapsed_s)
        }
    }

    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_expected? as f64;
        let rate = self.rate_per_sec()?;
        if rate <= 0.0 {
            None
        } else {
            Some(((total - self.completed as f64).max(0.0)) / rate)
        }
    }
}

pub type RequestsStats = CreditPhaseStats;
pub type RecordsStats = CreditPhaseStats;

/// Per-worker progress snapshot, keyed by worker id at the call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub pulled: u64,
    pub completed: u64,
    pub errors: u64,
}

/// Metadata + per-metric display-unit values for one exported record line
/// (`profile_export.jsonl`, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecordInfo {
    pub metadata: RecordMetadata,
    pub metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub phase: CreditPhase,
    pub conversation_id: String,
    pub turn_index: usize,
    pub start_perf_ns: PerfNs,
    pub end_perf_ns: PerfNs,
    pub model_name: String,
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub unit: String,
}
