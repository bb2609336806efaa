//! Run configuration (§4.7): the single document a benchmark invocation is
//! built from. The controller derives every subprocess's config file from
//! this plus whatever bus address the broker actually bound to.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use aiperf_http::HttpClientConfig;
use aiperf_metrics::SloConfig;
use aiperf_records::config::BenchmarkMode;
use aiperf_timing::{ConcurrencyConfig, FixedScheduleConfig, RequestRateConfig, StopCondition};
use aiperf_worker::config::SerializableEndpointType;

/// Which of the four input formats (§6) `dataset.path` holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    SingleTurn,
    MultiTurn,
    Trace,
    RandomPool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSource {
    pub path: PathBuf,
    pub format: DatasetFormat,
}

/// One credit-emitting phase's stop condition. WARMUP credits are pulled and
/// discarded by the records manager's phase filter; only PROFILING is
/// measured (§2 Glossary: Phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub stop: StopCondition,
}

/// Which timing strategy (§4.2) drives credit emission, and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    RequestRate(RequestRateConfig),
    Concurrency(ConcurrencyConfig),
    FixedSchedule(FixedScheduleConfig),
}

/// Everything a benchmark run needs: target endpoint, dataset, timing
/// strategy, worker fleet size, and export settings. The controller is
/// constructed from one of these and fans it out into per-service configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub model_name: String,
    pub base_url: String,
    pub endpoint_type: SerializableEndpointType,
    pub streaming: bool,
    pub api_key: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub http: HttpClientConfig,

    /// Goodput thresholds (§4.4 Good Request Count): a metric tag to the
    /// threshold its per-record value must satisfy, expressed in that
    /// metric's display unit. Handed to every worker unchanged.
    #[serde(default)]
    pub slo: SloConfig,

    pub dataset: DatasetSource,

    /// Number of worker subprocesses to spawn at startup.
    pub num_workers: u32,

    /// Address the broker binds (§4.1), e.g. `127.0.0.1:0` for an
    /// OS-assigned port. Resolved to the bound address before it's handed
    /// to any service config.
    #[serde(default = "default_bus_bind_addr")]
    pub bus_bind_addr: String,

    pub warmup: PhaseConfig,
    pub profiling: PhaseConfig,
    pub strategy: StrategyConfig,

    pub export_path: PathBuf,
    #[serde(default = "default_true")]
    pub export_records: bool,
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,

    #[serde(default = "default_registration_timeout_secs")]
    pub registration_timeout_secs: u64,
    #[serde(default = "default_configure_timeout_secs")]
    pub configure_timeout_secs: u64,
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Directory the controller writes per-service JSON config files into
    /// (§4.7 step 2). Defaults to the system temp directory.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_bus_bind_addr() -> String {
    "127.0.0.1:0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_flush_batch_size() -> usize {
    50
}

fn default_registration_timeout_secs() -> u64 {
    30
}

fn default_configure_timeout_secs() -> u64 {
    30
}

fn default_cancel_grace_secs() -> u64 {
    2
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

impl RunConfig {
    /// The `BenchmarkMode` the records manager should admit under, derived
    /// from the PROFILING phase's stop condition (§4.6).
    pub fn benchmark_mode(&self) -> BenchmarkMode {
        match self.profiling.stop {
            StopCondition::RequestCount(_) => BenchmarkMode::RequestCount,
            StopCondition::Duration { duration_secs, grace_period_secs } => {
                BenchmarkMode::Duration { duration_secs, grace_period_secs }
            }
        }
    }
}
