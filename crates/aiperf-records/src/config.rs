//! Records manager configuration (§4.6).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How long the PROFILING phase is expected to run; drives admission
/// filtering. `RequestCount` benchmarks admit every record unconditionally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkMode {
    RequestCount,
    Duration { duration_secs: f64, grace_period_secs: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsManagerConfig {
    pub service_id: String,
    /// Address of the controller's broker (§4.1), e.g. `127.0.0.1:8901`.
    pub bus_addr: String,
    pub mode: BenchmarkMode,
    /// Where `profile_export.jsonl` is written.
    pub export_path: PathBuf,
    /// Whether the record-export processor runs at all; some runs only want
    /// the aggregate summary.
    #[serde(default = "default_true")]
    pub export_records: bool,
    /// Records buffered before a flush to disk.
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_flush_batch_size() -> usize {
    50
}

impl Default for RecordsManagerConfig {
    fn default() -> Self {
        Self {
            service_id: "records-manager".to_string(),
            bus_addr: "127.0.0.1:8901".to_string(),
            mode: BenchmarkMode::RequestCount,
            export_path: PathBuf::from("profile_export.jsonl"),
            export_records: true,
            flush_batch_size: default_flush_batch_size(),
        }
    }
}
